//! Attribute model: one captured field plus every piece of metadata the
//! builder turns into overlays.
//!
//! # Responsibility
//! - Hold the mandatory name/type pair and optional per-attribute metadata.
//! - Fail fast on malformed type descriptors, before any bundle is built.
//!
//! # Invariants
//! - Optional fields stay absent unless explicitly set; empty translation maps
//!   count as absent.
//! - Translation maps keep insertion order, which the builder uses as
//!   first-encountered language order.
//! - A stored `Condition` is already rewritten to positional placeholders.

use crate::digest::identifier::Said;
use crate::error::OcaResult;
use crate::model::attribute_type::{AttributeType, ScalarType};
use crate::model::conformance::Conformance;
use crate::model::encoding::Encoding;
use crate::model::language::Language;
use crate::model::standard::Standard;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

/// Language-keyed text, in insertion order.
pub type Translations = IndexMap<Language, String>;

static CONDITION_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("valid condition placeholder regex"));

/// Condition expression with its attribute dependencies.
///
/// `${name}` placeholders are rewritten to `${0}`, `${1}`, ... indexing into
/// `dependencies`, so renaming dependencies never changes the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub expression: String,
    pub dependencies: Vec<String>,
}

impl Condition {
    /// Extracts `${attribute}` placeholders from a raw expression.
    ///
    /// Repeated references to the same attribute share one index.
    pub fn parse(raw: &str) -> Self {
        let mut dependencies: Vec<String> = Vec::new();
        let expression = CONDITION_PLACEHOLDER_RE
            .replace_all(raw, |caps: &Captures| {
                let name = caps[1].trim();
                let index = match dependencies.iter().position(|dep| dep == name) {
                    Some(index) => index,
                    None => {
                        dependencies.push(name.to_string());
                        dependencies.len() - 1
                    }
                };
                format!("${{{index}}}")
            })
            .into_owned();
        Self {
            expression,
            dependencies,
        }
    }

    /// Rebuilds a condition that is already in positional form.
    pub fn from_parts(expression: impl Into<String>, dependencies: Vec<String>) -> Self {
        Self {
            expression: expression.into(),
            dependencies,
        }
    }
}

/// One captured field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    /// Marks personal or otherwise sensitive data.
    pub flagged: bool,
    pub encoding: Option<Encoding>,
    pub format: Option<String>,
    pub unit: Option<String>,
    pub condition: Option<Condition>,
    pub labels: Translations,
    pub information: Translations,
    /// Entry code -> per-language label. Key order is the entry code order.
    pub entries: IndexMap<String, Translations>,
    pub standard: Option<Standard>,
    /// Allowed number of values, e.g. `1` or `1-3`.
    pub cardinality: Option<String>,
    pub conformance: Option<Conformance>,
    /// Target of a bare `Reference` type.
    pub reference_sai: Option<Said>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            flagged: false,
            encoding: None,
            format: None,
            unit: None,
            condition: None,
            labels: Translations::new(),
            information: Translations::new(),
            entries: IndexMap::new(),
            standard: None,
            cardinality: None,
            conformance: None,
            reference_sai: None,
        }
    }

    /// Creates an attribute from a structural type descriptor.
    ///
    /// # Errors
    /// - Surfaces the attribute type parser error unchanged.
    pub fn from_descriptor(name: impl Into<String>, descriptor: &Value) -> OcaResult<Self> {
        let attribute_type = AttributeType::parse(descriptor)?;
        Ok(Self::new(name, attribute_type))
    }

    pub fn flagged(mut self) -> Self {
        self.flagged = true;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the condition from a raw `${attribute}` expression.
    pub fn with_condition(mut self, expression: &str) -> Self {
        self.condition = Some(Condition::parse(expression));
        self
    }

    pub fn with_label(mut self, language: Language, label: impl Into<String>) -> Self {
        self.labels.insert(language, label.into());
        self
    }

    pub fn with_information(mut self, language: Language, text: impl Into<String>) -> Self {
        self.information.insert(language, text.into());
        self
    }

    /// Adds (or extends) entry `code` with a label in `language`.
    pub fn with_entry(
        mut self,
        code: impl Into<String>,
        language: Language,
        label: impl Into<String>,
    ) -> Self {
        self.entries
            .entry(code.into())
            .or_default()
            .insert(language, label.into());
        self
    }

    /// Declares entry codes without labels, keeping existing labels.
    pub fn with_entry_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.entries.entry(code.into()).or_default();
        }
        self
    }

    pub fn with_standard(mut self, standard: Standard) -> Self {
        self.standard = Some(standard);
        self
    }

    pub fn with_cardinality(mut self, cardinality: impl Into<String>) -> Self {
        self.cardinality = Some(cardinality.into());
        self
    }

    pub fn with_conformance(mut self, conformance: Conformance) -> Self {
        self.conformance = Some(conformance);
        self
    }

    pub fn with_reference_sai(mut self, said: Said) -> Self {
        self.reference_sai = Some(said);
        self
    }

    /// Type as written into the capture base.
    ///
    /// A bare `Reference` scalar with a `reference_sai` becomes a targeted
    /// reference; array wrapping is preserved.
    pub fn capture_type(&self) -> AttributeType {
        match &self.reference_sai {
            Some(said) => target_bare_reference(&self.attribute_type, said),
            None => self.attribute_type.clone(),
        }
    }

    /// Entry codes in declaration order.
    pub fn entry_codes(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Languages this attribute carries any text for, in first-seen order.
    pub fn languages(&self) -> Vec<Language> {
        let mut seen: Vec<Language> = Vec::new();
        let entry_langs = self.entries.values().flat_map(|labels| labels.keys());
        for language in self.labels.keys().chain(self.information.keys()).chain(entry_langs) {
            if !seen.contains(language) {
                seen.push(language.clone());
            }
        }
        seen
    }

    /// Entry labels for one language, in entry code order.
    pub fn entries_in(&self, language: &Language) -> IndexMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(code, labels)| {
                labels
                    .get(language)
                    .map(|label| (code.clone(), label.clone()))
            })
            .collect()
    }
}

fn target_bare_reference(attribute_type: &AttributeType, said: &Said) -> AttributeType {
    match attribute_type {
        AttributeType::Scalar(ScalarType::Reference) => AttributeType::Reference(said.clone()),
        AttributeType::Array(inner) => AttributeType::array(target_bare_reference(inner, said)),
        other => other.clone(),
    }
}
