//! Validation findings.

use crate::bundle::overlay::OverlayKind;
use crate::digest::identifier::Said;
use crate::model::language::Language;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Names (attributes or meta fields) lacking text in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTranslation {
    pub language: Language,
    pub names: Vec<String>,
}

/// One finding collected by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Bundle shape violates the minimal schema.
    Structural(String),
    /// Stored identifier does not match the recomputed one.
    DigestMismatch {
        object: String,
        expected: Said,
        found: Option<Said>,
    },
    /// Overlay points at a different capture base.
    CaptureBaseMismatch { object: String },
    /// Overlay or flag list names an attribute the capture base lacks.
    UnknownAttribute { object: String, attribute: String },
    /// One overlay kind lacks text in enforced languages.
    TranslationCoverage {
        overlay_kind: OverlayKind,
        missing: Vec<MissingTranslation>,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structural(message) => write!(f, "malformed bundle: {message}"),
            Self::DigestMismatch {
                object,
                expected,
                found,
            } => match found {
                Some(found) => write!(
                    f,
                    "{object}: digest mismatch (stored {found}, computed {expected})"
                ),
                None => write!(f, "{object}: missing digest (computed {expected})"),
            },
            Self::CaptureBaseMismatch { object } => {
                write!(f, "{object}: mismatch capture_base reference")
            }
            Self::UnknownAttribute { object, attribute } => {
                write!(f, "{object}: unknown attribute '{attribute}'")
            }
            Self::TranslationCoverage {
                overlay_kind,
                missing,
            } => {
                write!(f, "{overlay_kind} overlay: missing translations")?;
                for (i, entry) in missing.iter().enumerate() {
                    let sep = if i == 0 { " in " } else { "; " };
                    write!(f, "{sep}{} ({})", entry.language, entry.names.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

impl Error for ValidationError {}
