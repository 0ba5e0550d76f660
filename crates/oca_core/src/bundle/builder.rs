//! OCA box: accumulates classification, meta and attributes, then derives a
//! deterministic bundle from them.
//!
//! # Responsibility
//! - Collect builder input in any order, with last-write-wins replacement.
//! - Decide per overlay kind whether it is emitted, then digest everything.
//! - Reconstruct a box from an existing bundle for incremental extension.
//!
//! # Invariants
//! - `generate_bundle` does not mutate the box; calling it twice yields
//!   identical digests.
//! - The character encoding overlay is always emitted; every other kind is
//!   emitted only when some attribute or meta field feeds it.
//! - Language-specific overlays are split one per language and never
//!   back-fill missing translations.
//! - Flag order is the order attributes became flagged.

use crate::bundle::capture_base::CaptureBase;
use crate::bundle::overlay::{
    CardinalityContent, CharacterEncodingContent, ConditionalContent, ConformanceContent,
    EntryCodeContent, EntryContent, FormatContent, InformationContent, LabelContent, MetaContent,
    Overlay, OverlayContent, OverlayKind, StandardContent, UnitContent,
};
use crate::bundle::Bundle;
use crate::digest::stamp;
use crate::error::{OcaError, OcaResult};
use crate::model::attribute::{Attribute, Condition, Translations};
use crate::model::encoding::Encoding;
use crate::model::language::Language;
use indexmap::IndexMap;
use log::info;
use std::collections::BTreeMap;

/// Metric system used for units unless configured otherwise.
pub const DEFAULT_METRIC_SYSTEM: &str = "SI";

/// Meta field names that would collide with overlay framing.
const RESERVED_META_FIELDS: [&str; 4] = ["d", "type", "capture_base", "language"];

/// Mutable builder state behind a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcaBox {
    classification: Option<String>,
    meta: IndexMap<String, Translations>,
    attributes: IndexMap<String, Attribute>,
    flagged_order: Vec<String>,
    default_encoding: Encoding,
    metric_system: String,
}

impl Default for OcaBox {
    fn default() -> Self {
        Self::new()
    }
}

impl OcaBox {
    pub fn new() -> Self {
        Self {
            classification: None,
            meta: IndexMap::new(),
            attributes: IndexMap::new(),
            flagged_order: Vec::new(),
            default_encoding: Encoding::default(),
            metric_system: DEFAULT_METRIC_SYSTEM.to_string(),
        }
    }

    pub fn with_default_encoding(mut self, encoding: Encoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    pub fn with_metric_system(mut self, metric_system: impl Into<String>) -> Self {
        self.metric_system = metric_system.into();
        self
    }

    /// Sets the classification code.
    ///
    /// # Errors
    /// - `Configuration` when a different classification is already set.
    pub fn add_classification(&mut self, code: impl Into<String>) -> OcaResult<()> {
        let code = code.into();
        match &self.classification {
            Some(current) if *current != code => Err(OcaError::configuration(format!(
                "classification already set to `{current}`; refusing to switch to `{code}`"
            ))),
            _ => {
                self.classification = Some(code);
                Ok(())
            }
        }
    }

    /// Sets one meta field in every language given; replaces an earlier
    /// definition of the same field.
    ///
    /// # Errors
    /// - `Configuration` for an empty field name or one reserved for overlay
    ///   framing.
    pub fn add_meta(&mut self, field: &str, values: Translations) -> OcaResult<()> {
        let field = field.trim();
        if field.is_empty() {
            return Err(OcaError::configuration("meta field name cannot be empty"));
        }
        if RESERVED_META_FIELDS.contains(&field) {
            return Err(OcaError::configuration(format!(
                "meta field name `{field}` is reserved"
            )));
        }
        self.meta.insert(field.to_string(), values);
        Ok(())
    }

    /// Adds an attribute, replacing any earlier attribute with the same name
    /// in place.
    ///
    /// # Errors
    /// - `Configuration` for an empty attribute name.
    pub fn add_attribute(&mut self, attribute: Attribute) -> OcaResult<()> {
        if attribute.name.trim().is_empty() {
            return Err(OcaError::configuration("attribute name cannot be empty"));
        }
        let name = attribute.name.clone();
        let was_flagged = self.flagged_order.contains(&name);
        match (was_flagged, attribute.flagged) {
            (false, true) => self.flagged_order.push(name.clone()),
            (true, false) => self.flagged_order.retain(|flagged| *flagged != name),
            _ => {}
        }
        self.attributes.insert(name, attribute);
        Ok(())
    }

    pub fn classification(&self) -> Option<&str> {
        self.classification.as_deref()
    }

    pub fn meta(&self) -> &IndexMap<String, Translations> {
        &self.meta
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Attributes in display order (first insertion).
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn flagged_attributes(&self) -> &[String] {
        &self.flagged_order
    }

    pub fn default_encoding(&self) -> Encoding {
        self.default_encoding
    }

    pub fn metric_system(&self) -> &str {
        &self.metric_system
    }

    /// Finalizes the box into a digested bundle.
    ///
    /// # Errors
    /// - `Configuration` when a condition depends on an attribute that is not
    ///   in the box, or on its own attribute.
    /// - `Serialization` when an entity cannot be canonicalized.
    pub fn generate_bundle(&self) -> OcaResult<Bundle> {
        self.check_condition_dependencies()?;

        let mut capture_base = CaptureBase::new(self.classification.clone().unwrap_or_default());
        for attribute in self.attributes.values() {
            capture_base.add_attribute(attribute.name.clone(), attribute.capture_type());
        }
        capture_base.flagged_attributes = self.flagged_order.clone();
        let capture_base_said = stamp(&mut capture_base)?;

        let mut overlays = Vec::new();
        for kind in OverlayKind::ALL {
            for content in self.overlay_contents(kind) {
                let mut overlay = Overlay::new(content);
                overlay.capture_base = Some(capture_base_said.clone());
                stamp(&mut overlay)?;
                overlays.push(overlay);
            }
        }

        let mut bundle = Bundle {
            d: None,
            capture_base,
            overlays,
        };
        let bundle_said = stamp(&mut bundle)?;
        info!(
            "event=bundle_generate module=bundle status=ok attributes={} overlays={} said={}",
            self.attributes.len(),
            bundle.overlays.len(),
            bundle_said
        );
        Ok(bundle)
    }

    fn check_condition_dependencies(&self) -> OcaResult<()> {
        for attribute in self.attributes.values() {
            let Some(condition) = &attribute.condition else {
                continue;
            };
            for dependency in &condition.dependencies {
                if *dependency == attribute.name {
                    return Err(OcaError::configuration(format!(
                        "attribute `{dependency}` cannot be a dependency of itself"
                    )));
                }
                if !self.attributes.contains_key(dependency) {
                    return Err(OcaError::configuration(format!(
                        "condition of `{}` depends on unknown attribute `{dependency}`",
                        attribute.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Overlay payloads of one kind; empty when the kind has no data.
    fn overlay_contents(&self, kind: OverlayKind) -> Vec<OverlayContent> {
        match kind {
            OverlayKind::Meta => self.meta_contents(),
            OverlayKind::CharacterEncoding => {
                vec![OverlayContent::CharacterEncoding(CharacterEncodingContent {
                    default_character_encoding: self.default_encoding,
                    attribute_character_encoding: self.per_attribute(|a| {
                        a.encoding.filter(|encoding| *encoding != self.default_encoding)
                    }),
                })]
            }
            OverlayKind::EntryCode => {
                let codes = self.per_attribute(|a| {
                    (!a.entries.is_empty()).then(|| a.entry_codes())
                });
                non_empty(codes, |attribute_entry_codes| {
                    OverlayContent::EntryCode(EntryCodeContent {
                        attribute_entry_codes,
                    })
                })
            }
            OverlayKind::Entry => {
                let languages = first_seen_languages(
                    self.attributes
                        .values()
                        .flat_map(|a| a.entries.values()),
                );
                languages
                    .into_iter()
                    .filter_map(|language| {
                        let attribute_entries = self.per_attribute(|a| {
                            let labels = a.entries_in(&language);
                            (!labels.is_empty())
                                .then(|| labels.into_iter().collect::<BTreeMap<_, _>>())
                        });
                        (!attribute_entries.is_empty()).then(|| {
                            OverlayContent::Entry(EntryContent {
                                language,
                                attribute_entries,
                            })
                        })
                    })
                    .collect()
            }
            OverlayKind::Label => self.translated(
                |a| &a.labels,
                |language, attribute_labels| {
                    OverlayContent::Label(LabelContent {
                        language,
                        attribute_labels,
                    })
                },
            ),
            OverlayKind::Information => self.translated(
                |a| &a.information,
                |language, attribute_information| {
                    OverlayContent::Information(InformationContent {
                        language,
                        attribute_information,
                    })
                },
            ),
            OverlayKind::Format => non_empty(
                self.per_attribute(|a| a.format.clone()),
                |attribute_formats| OverlayContent::Format(FormatContent { attribute_formats }),
            ),
            OverlayKind::Unit => non_empty(self.per_attribute(|a| a.unit.clone()), |attribute_units| {
                OverlayContent::Unit(UnitContent {
                    metric_system: self.metric_system.clone(),
                    attribute_units,
                })
            }),
            OverlayKind::Standard => non_empty(
                self.per_attribute(|a| a.standard.clone()),
                |attribute_standards| {
                    OverlayContent::Standard(StandardContent {
                        attribute_standards,
                    })
                },
            ),
            OverlayKind::Conditional => {
                let conditions = self.per_attribute(|a| a.condition.clone());
                non_empty(conditions, |conditions| {
                    let mut attribute_conditions = BTreeMap::new();
                    let mut attribute_dependencies = BTreeMap::new();
                    for (name, condition) in conditions {
                        attribute_conditions.insert(name.clone(), condition.expression);
                        attribute_dependencies.insert(name, condition.dependencies);
                    }
                    OverlayContent::Conditional(ConditionalContent {
                        attribute_conditions,
                        attribute_dependencies,
                    })
                })
            }
            OverlayKind::Cardinality => non_empty(
                self.per_attribute(|a| a.cardinality.clone()),
                |attribute_cardinality| {
                    OverlayContent::Cardinality(CardinalityContent {
                        attribute_cardinality,
                    })
                },
            ),
            OverlayKind::Conformance => non_empty(
                self.per_attribute(|a| a.conformance),
                |attribute_conformance| {
                    OverlayContent::Conformance(ConformanceContent {
                        attribute_conformance,
                    })
                },
            ),
        }
    }

    fn meta_contents(&self) -> Vec<OverlayContent> {
        first_seen_languages(self.meta.values())
            .into_iter()
            .filter_map(|language| {
                let fields: BTreeMap<String, String> = self
                    .meta
                    .iter()
                    .filter_map(|(field, values)| {
                        values.get(&language).map(|text| (field.clone(), text.clone()))
                    })
                    .collect();
                (!fields.is_empty()).then(|| OverlayContent::Meta(MetaContent { language, fields }))
            })
            .collect()
    }

    fn translated<S, F>(&self, select: S, wrap: F) -> Vec<OverlayContent>
    where
        S: Fn(&Attribute) -> &Translations,
        F: Fn(Language, BTreeMap<String, String>) -> OverlayContent,
    {
        first_seen_languages(self.attributes.values().map(&select))
            .into_iter()
            .filter_map(|language| {
                let texts = self.per_attribute(|a| select(a).get(&language).cloned());
                (!texts.is_empty()).then(|| wrap(language, texts))
            })
            .collect()
    }

    fn per_attribute<T, F>(&self, value_of: F) -> BTreeMap<String, T>
    where
        F: Fn(&Attribute) -> Option<T>,
    {
        self.attributes
            .values()
            .filter_map(|attribute| value_of(attribute).map(|value| (attribute.name.clone(), value)))
            .collect()
    }

    /// Rebuilds a box from an existing bundle.
    ///
    /// Regenerating an unmodified loaded box reproduces the bundle digests.
    ///
    /// # Errors
    /// - `Structural` when a flagged attribute or an overlay entry names an
    ///   attribute the capture base does not declare.
    pub fn load(bundle: &Bundle) -> OcaResult<Self> {
        let capture_base = &bundle.capture_base;
        let mut oca_box = Self::new();
        if !capture_base.classification.is_empty() {
            oca_box.classification = Some(capture_base.classification.clone());
        }
        for (name, attribute_type) in &capture_base.attributes {
            oca_box
                .attributes
                .insert(name.clone(), Attribute::new(name.clone(), attribute_type.clone()));
        }
        for name in &capture_base.flagged_attributes {
            oca_box.attribute_mut(name)?.flagged = true;
            if !oca_box.flagged_order.contains(name) {
                oca_box.flagged_order.push(name.clone());
            }
        }

        // Entry codes fix entry order before any entry labels are read.
        let mut overlays: Vec<&Overlay> = bundle.overlays.iter().collect();
        overlays.sort_by_key(|overlay| overlay.kind());
        for overlay in overlays {
            oca_box.apply_overlay(&overlay.content)?;
        }

        info!(
            "event=box_load module=bundle status=ok attributes={} overlays={}",
            oca_box.attributes.len(),
            bundle.overlays.len()
        );
        Ok(oca_box)
    }

    fn attribute_mut(&mut self, name: &str) -> OcaResult<&mut Attribute> {
        self.attributes.get_mut(name).ok_or_else(|| {
            OcaError::Structural(format!(
                "attribute `{name}` is not declared in the capture base"
            ))
        })
    }

    fn apply_overlay(&mut self, content: &OverlayContent) -> OcaResult<()> {
        match content {
            OverlayContent::Meta(meta) => {
                for (field, text) in &meta.fields {
                    self.meta
                        .entry(field.clone())
                        .or_default()
                        .insert(meta.language.clone(), text.clone());
                }
            }
            OverlayContent::CharacterEncoding(encodings) => {
                self.default_encoding = encodings.default_character_encoding;
                for (name, encoding) in &encodings.attribute_character_encoding {
                    self.attribute_mut(name)?.encoding = Some(*encoding);
                }
            }
            OverlayContent::EntryCode(codes) => {
                for (name, codes) in &codes.attribute_entry_codes {
                    let attribute = self.attribute_mut(name)?;
                    for code in codes {
                        attribute.entries.entry(code.clone()).or_default();
                    }
                }
            }
            OverlayContent::Entry(entries) => {
                for (name, labels) in &entries.attribute_entries {
                    let attribute = self.attribute_mut(name)?;
                    for (code, label) in labels {
                        attribute
                            .entries
                            .entry(code.clone())
                            .or_default()
                            .insert(entries.language.clone(), label.clone());
                    }
                }
            }
            OverlayContent::Label(labels) => {
                for (name, label) in &labels.attribute_labels {
                    self.attribute_mut(name)?
                        .labels
                        .insert(labels.language.clone(), label.clone());
                }
            }
            OverlayContent::Information(information) => {
                for (name, text) in &information.attribute_information {
                    self.attribute_mut(name)?
                        .information
                        .insert(information.language.clone(), text.clone());
                }
            }
            OverlayContent::Format(formats) => {
                for (name, format) in &formats.attribute_formats {
                    self.attribute_mut(name)?.format = Some(format.clone());
                }
            }
            OverlayContent::Unit(units) => {
                self.metric_system = units.metric_system.clone();
                for (name, unit) in &units.attribute_units {
                    self.attribute_mut(name)?.unit = Some(unit.clone());
                }
            }
            OverlayContent::Standard(standards) => {
                for (name, standard) in &standards.attribute_standards {
                    self.attribute_mut(name)?.standard = Some(standard.clone());
                }
            }
            OverlayContent::Conditional(conditionals) => {
                for (name, expression) in &conditionals.attribute_conditions {
                    let dependencies = conditionals
                        .attribute_dependencies
                        .get(name)
                        .cloned()
                        .unwrap_or_default();
                    self.attribute_mut(name)?.condition =
                        Some(Condition::from_parts(expression.clone(), dependencies));
                }
            }
            OverlayContent::Cardinality(cardinalities) => {
                for (name, cardinality) in &cardinalities.attribute_cardinality {
                    self.attribute_mut(name)?.cardinality = Some(cardinality.clone());
                }
            }
            OverlayContent::Conformance(conformances) => {
                for (name, conformance) in &conformances.attribute_conformance {
                    self.attribute_mut(name)?.conformance = Some(*conformance);
                }
            }
        }
        Ok(())
    }
}

fn first_seen_languages<'a, I>(maps: I) -> Vec<Language>
where
    I: IntoIterator<Item = &'a Translations>,
{
    let mut seen: Vec<Language> = Vec::new();
    for language in maps.into_iter().flat_map(|map| map.keys()) {
        if !seen.contains(language) {
            seen.push(language.clone());
        }
    }
    seen
}

fn non_empty<T, F>(map: BTreeMap<String, T>, wrap: F) -> Vec<OverlayContent>
where
    F: FnOnce(BTreeMap<String, T>) -> OverlayContent,
{
    if map.is_empty() {
        Vec::new()
    } else {
        vec![wrap(map)]
    }
}

#[cfg(test)]
mod tests {
    use super::OcaBox;
    use crate::bundle::overlay::OverlayKind;
    use crate::error::OcaError;
    use crate::model::attribute::{Attribute, Translations};
    use crate::model::attribute_type::{AttributeType, ScalarType};
    use crate::model::language::Language;

    fn text(name: &str) -> Attribute {
        Attribute::new(name, AttributeType::Scalar(ScalarType::Text))
    }

    fn lang(code: &str) -> Language {
        Language::parse(code).expect("test language should parse")
    }

    #[test]
    fn conflicting_classification_is_rejected() {
        let mut oca_box = OcaBox::new();
        oca_box.add_classification("GICS:35102020").unwrap();
        oca_box.add_classification("GICS:35102020").unwrap();
        let err = oca_box.add_classification("GICS:1").unwrap_err();
        assert!(matches!(err, OcaError::Configuration(_)));
    }

    #[test]
    fn reserved_meta_fields_are_rejected() {
        let mut oca_box = OcaBox::new();
        assert!(oca_box.add_meta("language", Translations::new()).is_err());
        assert!(oca_box.add_meta("  ", Translations::new()).is_err());
    }

    #[test]
    fn re_adding_attribute_replaces_in_place_and_tracks_flags() {
        let mut oca_box = OcaBox::new();
        oca_box.add_attribute(text("a1").flagged()).unwrap();
        oca_box.add_attribute(text("a2").flagged()).unwrap();
        oca_box.add_attribute(text("a1")).unwrap();
        assert_eq!(oca_box.flagged_attributes(), ["a2"]);
        oca_box.add_attribute(text("a1").flagged()).unwrap();
        assert_eq!(oca_box.flagged_attributes(), ["a2", "a1"]);
        let names: Vec<_> = oca_box.attributes().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a1", "a2"]);
    }

    #[test]
    fn meta_is_split_per_language_without_back_fill() {
        let mut oca_box = OcaBox::new();
        oca_box
            .add_meta(
                "name",
                Translations::from([(lang("eng"), "Name".to_string()), (lang("pol"), "Nazwa".to_string())]),
            )
            .unwrap();
        oca_box
            .add_meta("description", Translations::from([(lang("eng"), "Desc".to_string())]))
            .unwrap();
        let bundle = oca_box.generate_bundle().unwrap();
        let meta: Vec<_> = bundle.overlays_of(OverlayKind::Meta).collect();
        assert_eq!(meta.len(), 2);
        let pol = bundle
            .overlays_of(OverlayKind::Meta)
            .find(|overlay| overlay.language() == Some(&lang("pol")))
            .expect("pol meta overlay");
        let value = pol.to_value().unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["name"], "Nazwa");
    }

    #[test]
    fn unknown_condition_dependency_is_rejected() {
        let mut oca_box = OcaBox::new();
        oca_box
            .add_attribute(text("a").with_condition("${missing} == 'x'"))
            .unwrap();
        let err = oca_box.generate_bundle().unwrap_err();
        assert!(matches!(err, OcaError::Configuration(message) if message.contains("missing")));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut oca_box = OcaBox::new();
        oca_box.add_attribute(text("a").with_condition("${a} > 1")).unwrap();
        assert!(oca_box.generate_bundle().is_err());
    }
}
