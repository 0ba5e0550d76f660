//! Bundle validator.
//!
//! # Responsibility
//! - Check bundle shape, digest integrity and translation completeness.
//! - Collect findings into a report instead of failing.
//!
//! # Invariants
//! - A structural failure yields exactly one error and skips every later
//!   phase.
//! - Translation findings are grouped per overlay kind: one error per kind
//!   lacking coverage, however many attributes or languages are missing.
//! - Languages that are present but not enforced are never reported.
//! - A `Validator` carries its own configuration and keeps no state between
//!   calls.

mod error;

pub use error::{MissingTranslation, ValidationError};

use crate::bundle::capture_base::CAPTURE_BASE_TYPE;
use crate::bundle::overlay::{Overlay, OverlayContent, OverlayKind};
use crate::bundle::Bundle;
use crate::digest::identifier::Said;
use crate::digest::{compute_said, Digestable};
use crate::error::OcaError;
use crate::model::language::Language;
use log::info;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;

/// Outcome of one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    #[serde(serialize_with = "serialize_messages")]
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }

    /// Human-readable error messages, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

fn serialize_messages<S>(errors: &[ValidationError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

/// Configurable bundle validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    enforced_translations: Vec<Language>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires every translated overlay kind to cover `languages`.
    pub fn enforce_translations(mut self, languages: Vec<Language>) -> Self {
        for language in languages {
            if !self.enforced_translations.contains(&language) {
                self.enforced_translations.push(language);
            }
        }
        self
    }

    pub fn enforced_translations(&self) -> &[Language] {
        &self.enforced_translations
    }

    /// Validates a bundle in its plain structural form.
    pub fn validate_value(&self, value: &Value) -> ValidationReport {
        match Bundle::from_value(value) {
            Ok(bundle) => self.validate(&bundle),
            Err(err) => {
                let message = match err {
                    OcaError::Structural(message) => message,
                    other => other.to_string(),
                };
                self.finish(vec![ValidationError::Structural(message)], "structural")
            }
        }
    }

    pub fn validate(&self, bundle: &Bundle) -> ValidationReport {
        if let Some(error) = structural_error(bundle) {
            return self.finish(vec![error], "structural");
        }
        let mut errors = integrity_errors(bundle);
        errors.extend(self.translation_errors(bundle));
        self.finish(errors, "complete")
    }

    fn finish(&self, errors: Vec<ValidationError>, phase: &str) -> ValidationReport {
        let report = ValidationReport::from_errors(errors);
        info!(
            "event=bundle_validate module=validator status={} phase={} errors={} enforced_languages={}",
            if report.success { "ok" } else { "error" },
            phase,
            report.errors.len(),
            self.enforced_translations.len()
        );
        report
    }

    fn translation_errors(&self, bundle: &Bundle) -> Vec<ValidationError> {
        if self.enforced_translations.is_empty() {
            return Vec::new();
        }
        OverlayKind::ALL
            .into_iter()
            .filter(|kind| kind.is_language_specific())
            .filter_map(|kind| {
                let overlays: Vec<&Overlay> = bundle.overlays_of(kind).collect();
                self.coverage_error(kind, &overlays)
            })
            .collect()
    }

    fn coverage_error(&self, kind: OverlayKind, overlays: &[&Overlay]) -> Option<ValidationError> {
        if overlays.is_empty() {
            return None;
        }
        let required: BTreeSet<&str> = overlays
            .iter()
            .flat_map(|overlay| translated_keys(&overlay.content))
            .collect();

        let missing: Vec<MissingTranslation> = self
            .enforced_translations
            .iter()
            .filter_map(|language| {
                let present: BTreeSet<&str> = overlays
                    .iter()
                    .filter(|overlay| overlay.language() == Some(language))
                    .flat_map(|overlay| translated_keys(&overlay.content))
                    .collect();
                let names: Vec<String> = required
                    .difference(&present)
                    .map(|name| name.to_string())
                    .collect();
                (!names.is_empty()).then(|| MissingTranslation {
                    language: language.clone(),
                    names,
                })
            })
            .collect();

        (!missing.is_empty()).then_some(ValidationError::TranslationCoverage {
            overlay_kind: kind,
            missing,
        })
    }
}

/// Keys that must be present in every enforced language: meta fields for
/// meta overlays, attribute names for the rest.
fn translated_keys(content: &OverlayContent) -> Vec<&str> {
    match content {
        OverlayContent::Meta(meta) => meta.fields.keys().map(String::as_str).collect(),
        other => other.attribute_names(),
    }
}

fn structural_error(bundle: &Bundle) -> Option<ValidationError> {
    if bundle.capture_base.base_type != CAPTURE_BASE_TYPE {
        return Some(ValidationError::Structural(format!(
            "unexpected capture base type `{}`",
            bundle.capture_base.base_type
        )));
    }
    None
}

fn integrity_errors(bundle: &Bundle) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let capture_base = &bundle.capture_base;

    check_digest("capture_base", capture_base, &mut errors);
    for name in &capture_base.flagged_attributes {
        if !capture_base.has_attribute(name) {
            errors.push(ValidationError::UnknownAttribute {
                object: "capture_base".to_string(),
                attribute: name.clone(),
            });
        }
    }

    for overlay in &bundle.overlays {
        let object = overlay_label(overlay);
        check_digest(&object, overlay, &mut errors);
        if overlay.capture_base != capture_base.d {
            errors.push(ValidationError::CaptureBaseMismatch {
                object: object.clone(),
            });
        }
        for name in overlay.content.attribute_names() {
            if !capture_base.has_attribute(name) {
                errors.push(ValidationError::UnknownAttribute {
                    object: object.clone(),
                    attribute: name.to_string(),
                });
            }
        }
    }

    check_digest("bundle", bundle, &mut errors);
    errors
}

fn check_digest<T: Digestable>(object: &str, entity: &T, errors: &mut Vec<ValidationError>) {
    let expected: Said = match compute_said(entity) {
        Ok(said) => said,
        Err(err) => {
            errors.push(ValidationError::Structural(format!(
                "{object}: cannot compute digest: {err}"
            )));
            return;
        }
    };
    if entity.said() != Some(&expected) {
        errors.push(ValidationError::DigestMismatch {
            object: object.to_string(),
            expected,
            found: entity.said().cloned(),
        });
    }
}

fn overlay_label(overlay: &Overlay) -> String {
    match overlay.language() {
        Some(language) => format!("{} ({language})", overlay.kind()),
        None => overlay.kind().to_string(),
    }
}
