//! Core library for Overlays Capture Architecture (OCA) bundles.
//! Builds, digests, serializes and validates capture bases and overlays.

pub mod ast;
pub mod bundle;
pub mod digest;
pub mod error;
pub mod logging;
pub mod model;
pub mod validator;

pub use ast::{Command, ObjectKind, OcaAst, AST_VERSION};
pub use bundle::builder::OcaBox;
pub use bundle::capture_base::CaptureBase;
pub use bundle::overlay::{Overlay, OverlayContent, OverlayKind};
pub use bundle::Bundle;
pub use digest::identifier::{Said, SaidError};
pub use error::{OcaError, OcaResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::attribute::{Attribute, Condition, Translations};
pub use model::attribute_type::{AttributeType, AttributeTypeError, ScalarType};
pub use model::conformance::Conformance;
pub use model::encoding::Encoding;
pub use model::language::Language;
pub use model::standard::Standard;
pub use validator::{ValidationError, ValidationReport, Validator};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
