//! Attribute standards expressed as URNs.
//!
//! # Invariants
//! - A `Standard` is always a syntactically valid, lowercased URN
//!   (`urn:<nid>:<nss>`). It is never resolved.

use crate::error::{OcaError, OcaResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static URN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^urn:[a-z0-9][a-z0-9-]{0,31}:[a-z0-9()+,\-.:=@;$_!*'%/?#]+$")
        .expect("valid urn regex")
});

/// Standard an attribute value conforms to, e.g. `urn:iso:std:iso:8601`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Standard(String);

impl Standard {
    pub fn parse(value: &str) -> OcaResult<Self> {
        let normalized = value.trim().to_lowercase();
        if !URN_PATTERN.is_match(&normalized) {
            return Err(OcaError::configuration(format!(
                "invalid standard `{}`; expected urn:<nid>:<nss>",
                value.trim()
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Standard {
    type Error = OcaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<Standard> for String {
    fn from(value: Standard) -> Self {
        value.0
    }
}

impl Display for Standard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
