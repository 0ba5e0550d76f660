//! Bundle: a digested capture base plus its complete overlay set.
//!
//! # Responsibility
//! - Hold the unit of distribution and its export/import contract
//!   `{d, capture_base: {...}, overlays: [...]}`.
//! - Define what the bundle digest commits to.
//!
//! # Invariants
//! - The bundle digest commits to the capture base digest and the set of
//!   overlay digests sorted by kind then language, never to overlay
//!   insertion order.
//! - A loaded bundle is taken as-is; nothing is re-digested on import.
//!
//! # See also
//! - `builder` for generation, `crate::validator` for integrity checks.

pub mod builder;
pub mod capture_base;
pub mod overlay;

use crate::digest::identifier::Said;
use crate::digest::{Digestable, DIGEST_FIELD};
use crate::error::{OcaError, OcaResult};
use capture_base::CaptureBase;
use log::info;
use overlay::{take_said, Overlay, OverlayKind};
use serde_json::{json, Map, Value};

pub const CAPTURE_BASE_KEY: &str = "capture_base";
pub const OVERLAYS_KEY: &str = "overlays";

/// Capture base fields every conforming export carries.
pub const CAPTURE_BASE_MANDATORY_FIELDS: [&str; 5] = [
    "d",
    "type",
    "classification",
    "attributes",
    "flagged_attributes",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub d: Option<Said>,
    pub capture_base: CaptureBase,
    pub overlays: Vec<Overlay>,
}

impl Bundle {
    pub fn said(&self) -> Option<&Said> {
        self.d.as_ref()
    }

    /// Overlays of one kind, in bundle order.
    pub fn overlays_of(&self, kind: OverlayKind) -> impl Iterator<Item = &Overlay> {
        self.overlays
            .iter()
            .filter(move |overlay| overlay.kind() == kind)
    }

    /// Plain structural export value.
    pub fn to_value(&self) -> OcaResult<Value> {
        let overlays = self
            .overlays
            .iter()
            .map(Overlay::to_value)
            .collect::<OcaResult<Vec<_>>>()?;
        let capture_base = serde_json::to_value(&self.capture_base)?;
        Ok(json!({
            DIGEST_FIELD: self.d,
            CAPTURE_BASE_KEY: capture_base,
            OVERLAYS_KEY: overlays,
        }))
    }

    /// Imports a bundle produced by any compliant exporter.
    ///
    /// # Errors
    /// - `Structural` when the value is not an object, the capture base lacks
    ///   a mandatory field, `overlays` is not a sequence, or any overlay fails
    ///   to parse.
    pub fn from_value(value: &Value) -> OcaResult<Self> {
        let mut object = value
            .as_object()
            .cloned()
            .ok_or_else(|| OcaError::Structural("bundle must be an object".to_string()))?;
        let d = take_said(&mut object, DIGEST_FIELD)?;
        let capture_base = parse_capture_base(object.get(CAPTURE_BASE_KEY))?;
        let overlays = match object.get(OVERLAYS_KEY) {
            Some(Value::Array(items)) => items
                .iter()
                .map(Overlay::from_value)
                .collect::<OcaResult<Vec<_>>>()?,
            Some(_) => {
                return Err(OcaError::Structural(
                    "`overlays` must be an ordered sequence".to_string(),
                ))
            }
            None => return Err(OcaError::Structural("`overlays` is missing".to_string())),
        };
        info!(
            "event=bundle_load module=bundle status=ok attributes={} overlays={}",
            capture_base.attributes.len(),
            overlays.len()
        );
        Ok(Self {
            d,
            capture_base,
            overlays,
        })
    }
}

fn parse_capture_base(value: Option<&Value>) -> OcaResult<CaptureBase> {
    let object = match value {
        Some(Value::Object(object)) => object,
        Some(_) => {
            return Err(OcaError::Structural(
                "`capture_base` must be an object".to_string(),
            ))
        }
        None => return Err(OcaError::Structural("`capture_base` is missing".to_string())),
    };
    check_mandatory_fields(object)?;
    serde_json::from_value(Value::Object(object.clone()))
        .map_err(|err| OcaError::Structural(format!("invalid capture base: {err}")))
}

fn check_mandatory_fields(object: &Map<String, Value>) -> OcaResult<()> {
    match CAPTURE_BASE_MANDATORY_FIELDS
        .iter()
        .find(|field| !object.contains_key(**field))
    {
        Some(field) => Err(OcaError::Structural(format!(
            "capture base is missing mandatory field `{field}`"
        ))),
        None => Ok(()),
    }
}

impl Digestable for Bundle {
    fn digest_input(&self) -> OcaResult<Value> {
        let mut overlays: Vec<&Overlay> = self.overlays.iter().collect();
        overlays.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let overlay_saids: Vec<Option<&Said>> = overlays.iter().map(|o| o.d.as_ref()).collect();
        Ok(json!({
            DIGEST_FIELD: self.d,
            CAPTURE_BASE_KEY: self.capture_base.d,
            OVERLAYS_KEY: overlay_saids,
        }))
    }

    fn said(&self) -> Option<&Said> {
        self.d.as_ref()
    }

    fn set_said(&mut self, said: Said) {
        self.d = Some(said);
    }
}

#[cfg(test)]
mod tests {
    use super::Bundle;
    use crate::error::OcaError;
    use serde_json::json;

    #[test]
    fn overlays_given_as_map_are_rejected() {
        let err = Bundle::from_value(&json!({
            "d": null,
            "capture_base": {
                "d": null,
                "type": "spec/capture_base/1.0",
                "classification": "",
                "attributes": {},
                "flagged_attributes": []
            },
            "overlays": {"character_encoding": {}}
        }))
        .unwrap_err();
        assert!(matches!(err, OcaError::Structural(message) if message.contains("sequence")));
    }

    #[test]
    fn capture_base_without_flagged_list_is_rejected() {
        let err = Bundle::from_value(&json!({
            "capture_base": {
                "d": null,
                "type": "spec/capture_base/1.0",
                "classification": "",
                "attributes": {}
            },
            "overlays": []
        }))
        .unwrap_err();
        assert!(matches!(err, OcaError::Structural(message) if message.contains("flagged_attributes")));
    }
}
