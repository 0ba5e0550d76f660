//! Capture base: the attribute inventory every overlay hangs off.
//!
//! # Invariants
//! - `attributes` is keyed by name; key order never reaches the digest.
//! - `flagged_attributes` order is the order attributes were flagged in.
//! - `d` is `None` only while the base is being assembled.

use crate::digest::identifier::Said;
use crate::digest::Digestable;
use crate::error::OcaResult;
use crate::model::attribute_type::AttributeType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Versioned type tag carried by every capture base.
pub const CAPTURE_BASE_TYPE: &str = "spec/capture_base/1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureBase {
    pub d: Option<Said>,
    #[serde(rename = "type")]
    pub base_type: String,
    pub classification: String,
    pub attributes: BTreeMap<String, AttributeType>,
    pub flagged_attributes: Vec<String>,
}

impl CaptureBase {
    pub fn new(classification: impl Into<String>) -> Self {
        Self {
            d: None,
            base_type: CAPTURE_BASE_TYPE.to_string(),
            classification: classification.into(),
            attributes: BTreeMap::new(),
            flagged_attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, attribute_type: AttributeType) {
        self.attributes.insert(name.into(), attribute_type);
    }

    pub fn flag(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.flagged_attributes.contains(&name) {
            self.flagged_attributes.push(name);
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

impl Digestable for CaptureBase {
    fn digest_input(&self) -> OcaResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn said(&self) -> Option<&Said> {
        self.d.as_ref()
    }

    fn set_said(&mut self, said: Said) {
        self.d = Some(said);
    }
}
