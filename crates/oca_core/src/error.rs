//! Crate-level error taxonomy.
//!
//! # Responsibility
//! - Give builder/loader callers one error type to propagate with `?`.
//! - Keep parser errors intact so callers can still match on them.
//!
//! # Invariants
//! - Builder and loader errors are fail-fast; validation findings are never
//!   reported through this type (see `validator::ValidationError`).

use crate::model::attribute_type::AttributeTypeError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OcaResult<T> = Result<T, OcaError>;

/// Error returned by attribute construction, bundle generation and loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcaError {
    /// Type descriptor rejected by the attribute type parser.
    AttributeType(AttributeTypeError),
    /// Builder misuse: conflicting classification, bad language code,
    /// reserved meta field, unknown condition dependency.
    Configuration(String),
    /// Entity could not be turned into its canonical digest form.
    Serialization(String),
    /// Imported value does not have the shape of a bundle.
    Structural(String),
}

impl OcaError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl Display for OcaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttributeType(err) => write!(f, "{err}"),
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Serialization(message) => write!(f, "serialization error: {message}"),
            Self::Structural(message) => write!(f, "malformed bundle: {message}"),
        }
    }
}

impl Error for OcaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AttributeType(err) => Some(err),
            Self::Configuration(_) | Self::Serialization(_) | Self::Structural(_) => None,
        }
    }
}

impl From<AttributeTypeError> for OcaError {
    fn from(value: AttributeTypeError) -> Self {
        Self::AttributeType(value)
    }
}

impl From<serde_json::Error> for OcaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}
