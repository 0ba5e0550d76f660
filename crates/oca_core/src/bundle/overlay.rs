//! Overlays: metadata layers attached to a capture base by digest.
//!
//! # Responsibility
//! - Define the overlay kinds, their versioned type tags and their payloads.
//! - Map overlays to and from the flat structural form
//!   `{d, type, capture_base, language?, ...fields}`.
//!
//! # Invariants
//! - `OverlayKind` declaration order is the canonical overlay order used for
//!   bundles, the AST and the bundle digest.
//! - Payloads never contain the framing keys `d`, `type` or `capture_base`.
//! - Language-specific kinds always carry exactly one language.

use crate::digest::identifier::Said;
use crate::digest::{Digestable, DIGEST_FIELD};
use crate::error::{OcaError, OcaResult};
use crate::model::conformance::Conformance;
use crate::model::encoding::Encoding;
use crate::model::language::Language;
use crate::model::standard::Standard;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const TYPE_FIELD: &str = "type";
pub const CAPTURE_BASE_FIELD: &str = "capture_base";
pub const LANGUAGE_FIELD: &str = "language";

const OVERLAY_TYPE_PREFIX: &str = "spec/overlays/";
const OVERLAY_TYPE_VERSION: &str = "1.0";

/// Overlay kinds in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverlayKind {
    Meta,
    CharacterEncoding,
    EntryCode,
    Entry,
    Label,
    Information,
    Format,
    Unit,
    Standard,
    Conditional,
    Cardinality,
    Conformance,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 12] = [
        Self::Meta,
        Self::CharacterEncoding,
        Self::EntryCode,
        Self::Entry,
        Self::Label,
        Self::Information,
        Self::Format,
        Self::Unit,
        Self::Standard,
        Self::Conditional,
        Self::Cardinality,
        Self::Conformance,
    ];

    /// Object kind name used by AST commands.
    pub fn name(self) -> &'static str {
        match self {
            Self::Meta => "Meta",
            Self::CharacterEncoding => "CharacterEncoding",
            Self::EntryCode => "EntryCode",
            Self::Entry => "Entry",
            Self::Label => "Label",
            Self::Information => "Information",
            Self::Format => "Format",
            Self::Unit => "Unit",
            Self::Standard => "Standard",
            Self::Conditional => "Conditional",
            Self::Cardinality => "Cardinality",
            Self::Conformance => "Conformance",
        }
    }

    fn tag_segment(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::CharacterEncoding => "character_encoding",
            Self::EntryCode => "entry_code",
            Self::Entry => "entry",
            Self::Label => "label",
            Self::Information => "information",
            Self::Format => "format",
            Self::Unit => "unit",
            Self::Standard => "standard",
            Self::Conditional => "conditional",
            Self::Cardinality => "cardinality",
            Self::Conformance => "conformance",
        }
    }

    /// Versioned type tag, e.g. `spec/overlays/label/1.0`.
    pub fn type_tag(self) -> String {
        format!(
            "{OVERLAY_TYPE_PREFIX}{}/{OVERLAY_TYPE_VERSION}",
            self.tag_segment()
        )
    }

    pub fn from_type_tag(tag: &str) -> Option<Self> {
        let segment = tag
            .strip_prefix(OVERLAY_TYPE_PREFIX)?
            .strip_suffix(OVERLAY_TYPE_VERSION)?
            .strip_suffix('/')?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag_segment() == segment)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether one instance is emitted per language.
    pub fn is_language_specific(self) -> bool {
        matches!(
            self,
            Self::Meta | Self::Entry | Self::Label | Self::Information
        )
    }
}

impl Display for OverlayKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaContent {
    pub language: Language,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterEncodingContent {
    pub default_character_encoding: Encoding,
    #[serde(default)]
    pub attribute_character_encoding: BTreeMap<String, Encoding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCodeContent {
    pub attribute_entry_codes: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryContent {
    pub language: Language,
    pub attribute_entries: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelContent {
    pub language: Language,
    pub attribute_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationContent {
    pub language: Language,
    pub attribute_information: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatContent {
    pub attribute_formats: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitContent {
    pub metric_system: String,
    pub attribute_units: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardContent {
    pub attribute_standards: BTreeMap<String, Standard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalContent {
    pub attribute_conditions: BTreeMap<String, String>,
    pub attribute_dependencies: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityContent {
    pub attribute_cardinality: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformanceContent {
    pub attribute_conformance: BTreeMap<String, Conformance>,
}

/// Kind-specific overlay payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayContent {
    Meta(MetaContent),
    CharacterEncoding(CharacterEncodingContent),
    EntryCode(EntryCodeContent),
    Entry(EntryContent),
    Label(LabelContent),
    Information(InformationContent),
    Format(FormatContent),
    Unit(UnitContent),
    Standard(StandardContent),
    Conditional(ConditionalContent),
    Cardinality(CardinalityContent),
    Conformance(ConformanceContent),
}

impl OverlayContent {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Meta(_) => OverlayKind::Meta,
            Self::CharacterEncoding(_) => OverlayKind::CharacterEncoding,
            Self::EntryCode(_) => OverlayKind::EntryCode,
            Self::Entry(_) => OverlayKind::Entry,
            Self::Label(_) => OverlayKind::Label,
            Self::Information(_) => OverlayKind::Information,
            Self::Format(_) => OverlayKind::Format,
            Self::Unit(_) => OverlayKind::Unit,
            Self::Standard(_) => OverlayKind::Standard,
            Self::Conditional(_) => OverlayKind::Conditional,
            Self::Cardinality(_) => OverlayKind::Cardinality,
            Self::Conformance(_) => OverlayKind::Conformance,
        }
    }

    pub fn language(&self) -> Option<&Language> {
        match self {
            Self::Meta(content) => Some(&content.language),
            Self::Entry(content) => Some(&content.language),
            Self::Label(content) => Some(&content.language),
            Self::Information(content) => Some(&content.language),
            _ => None,
        }
    }

    /// Attribute names this payload mentions, dependency targets included.
    pub fn attribute_names(&self) -> Vec<&str> {
        fn keys<V>(map: &BTreeMap<String, V>) -> impl Iterator<Item = &str> {
            map.keys().map(String::as_str)
        }
        match self {
            Self::Meta(_) => Vec::new(),
            Self::CharacterEncoding(c) => keys(&c.attribute_character_encoding).collect(),
            Self::EntryCode(c) => keys(&c.attribute_entry_codes).collect(),
            Self::Entry(c) => keys(&c.attribute_entries).collect(),
            Self::Label(c) => keys(&c.attribute_labels).collect(),
            Self::Information(c) => keys(&c.attribute_information).collect(),
            Self::Format(c) => keys(&c.attribute_formats).collect(),
            Self::Unit(c) => keys(&c.attribute_units).collect(),
            Self::Standard(c) => keys(&c.attribute_standards).collect(),
            Self::Cardinality(c) => keys(&c.attribute_cardinality).collect(),
            Self::Conformance(c) => keys(&c.attribute_conformance).collect(),
            Self::Conditional(c) => {
                let mut names: Vec<&str> = keys(&c.attribute_conditions)
                    .chain(keys(&c.attribute_dependencies))
                    .chain(c.attribute_dependencies.values().flatten().map(String::as_str))
                    .collect();
                names.sort_unstable();
                names.dedup();
                names
            }
        }
    }

    /// Payload fields as a flat object, without framing keys.
    pub fn to_fields(&self) -> OcaResult<Map<String, Value>> {
        let value = match self {
            Self::Meta(c) => serde_json::to_value(c)?,
            Self::CharacterEncoding(c) => serde_json::to_value(c)?,
            Self::EntryCode(c) => serde_json::to_value(c)?,
            Self::Entry(c) => serde_json::to_value(c)?,
            Self::Label(c) => serde_json::to_value(c)?,
            Self::Information(c) => serde_json::to_value(c)?,
            Self::Format(c) => serde_json::to_value(c)?,
            Self::Unit(c) => serde_json::to_value(c)?,
            Self::Standard(c) => serde_json::to_value(c)?,
            Self::Conditional(c) => serde_json::to_value(c)?,
            Self::Cardinality(c) => serde_json::to_value(c)?,
            Self::Conformance(c) => serde_json::to_value(c)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(OcaError::Serialization(format!(
                "{} payload is not an object",
                self.kind()
            ))),
        }
    }

    /// Parses a payload of `kind` from flat fields.
    ///
    /// Framing keys must already be removed.
    pub fn from_fields(kind: OverlayKind, fields: Map<String, Value>) -> OcaResult<Self> {
        let value = Value::Object(fields);
        let content = match kind {
            OverlayKind::Meta => Self::Meta(parse_payload(kind, value)?),
            OverlayKind::CharacterEncoding => Self::CharacterEncoding(parse_payload(kind, value)?),
            OverlayKind::EntryCode => Self::EntryCode(parse_payload(kind, value)?),
            OverlayKind::Entry => Self::Entry(parse_payload(kind, value)?),
            OverlayKind::Label => Self::Label(parse_payload(kind, value)?),
            OverlayKind::Information => Self::Information(parse_payload(kind, value)?),
            OverlayKind::Format => Self::Format(parse_payload(kind, value)?),
            OverlayKind::Unit => Self::Unit(parse_payload(kind, value)?),
            OverlayKind::Standard => Self::Standard(parse_payload(kind, value)?),
            OverlayKind::Conditional => Self::Conditional(parse_payload(kind, value)?),
            OverlayKind::Cardinality => Self::Cardinality(parse_payload(kind, value)?),
            OverlayKind::Conformance => Self::Conformance(parse_payload(kind, value)?),
        };
        Ok(content)
    }
}

fn parse_payload<T: DeserializeOwned>(kind: OverlayKind, value: Value) -> OcaResult<T> {
    serde_json::from_value(value)
        .map_err(|err| OcaError::Structural(format!("invalid {kind} overlay: {err}")))
}

/// One digested overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub d: Option<Said>,
    pub capture_base: Option<Said>,
    pub content: OverlayContent,
}

impl Overlay {
    pub fn new(content: OverlayContent) -> Self {
        Self {
            d: None,
            capture_base: None,
            content,
        }
    }

    pub fn kind(&self) -> OverlayKind {
        self.content.kind()
    }

    pub fn language(&self) -> Option<&Language> {
        self.content.language()
    }

    /// Canonical position: kind order first, then language code.
    pub fn sort_key(&self) -> (OverlayKind, Option<&Language>) {
        (self.kind(), self.language())
    }

    pub fn to_value(&self) -> OcaResult<Value> {
        let mut object = self.content.to_fields()?;
        object.insert(DIGEST_FIELD.to_string(), optional_said(&self.d));
        object.insert(
            TYPE_FIELD.to_string(),
            Value::String(self.kind().type_tag()),
        );
        object.insert(
            CAPTURE_BASE_FIELD.to_string(),
            optional_said(&self.capture_base),
        );
        Ok(Value::Object(object))
    }

    /// Reads an overlay from its flat structural form.
    ///
    /// # Errors
    /// - `Structural` when the value is not an object, the type tag is
    ///   missing or unknown, an identifier does not decode, or the payload
    ///   does not match its kind.
    pub fn from_value(value: &Value) -> OcaResult<Self> {
        let mut object = value
            .as_object()
            .cloned()
            .ok_or_else(|| OcaError::Structural("overlay must be an object".to_string()))?;
        let tag = match object.remove(TYPE_FIELD) {
            Some(Value::String(tag)) => tag,
            _ => {
                return Err(OcaError::Structural(
                    "overlay is missing its type tag".to_string(),
                ))
            }
        };
        let kind = OverlayKind::from_type_tag(&tag)
            .ok_or_else(|| OcaError::Structural(format!("unknown overlay type `{tag}`")))?;
        let d = take_said(&mut object, DIGEST_FIELD)?;
        let capture_base = take_said(&mut object, CAPTURE_BASE_FIELD)?;
        let content = OverlayContent::from_fields(kind, object)?;
        Ok(Self {
            d,
            capture_base,
            content,
        })
    }
}

fn optional_said(said: &Option<Said>) -> Value {
    match said {
        Some(said) => Value::String(said.to_string()),
        None => Value::Null,
    }
}

pub(crate) fn take_said(object: &mut Map<String, Value>, field: &str) -> OcaResult<Option<Said>> {
    match object.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => text
            .parse::<Said>()
            .map(Some)
            .map_err(|err| OcaError::Structural(format!("invalid `{field}` identifier: {err}"))),
        Some(_) => Err(OcaError::Structural(format!(
            "`{field}` must be an identifier string"
        ))),
    }
}

impl Digestable for Overlay {
    fn digest_input(&self) -> OcaResult<Value> {
        self.to_value()
    }

    fn said(&self) -> Option<&Said> {
        self.d.as_ref()
    }

    fn set_said(&mut self, said: Said) {
        self.d = Some(said);
    }
}

impl Serialize for Overlay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Overlay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}
