//! AST serializer: linearizes a bundle into an ordered, replayable command
//! sequence `{version, commands: [{object_kind, ...payload}]}`.
//!
//! # Responsibility
//! - Emit the capture base first, then overlays in canonical kind order.
//! - Replay a command sequence back into a freshly digested bundle.
//!
//! # Invariants
//! - Command payloads never carry digests or capture base links; replay
//!   re-derives them, so replaying the AST of a bundle reproduces its digests.
//! - Within one kind, commands keep bundle order (first-encountered language).
//! - Absent kinds are skipped, never emitted empty.

use crate::bundle::capture_base::CaptureBase;
use crate::bundle::overlay::{Overlay, OverlayContent, OverlayKind};
use crate::bundle::Bundle;
use crate::digest::stamp;
use crate::error::{OcaError, OcaResult};
use crate::model::attribute_type::AttributeType;
use log::info;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const AST_VERSION: &str = "1.0.0";
pub const OBJECT_KIND_FIELD: &str = "object_kind";

const CAPTURE_BASE_KIND_NAME: &str = "CaptureBase";

/// What a command creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    CaptureBase,
    Overlay(OverlayKind),
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::CaptureBase => CAPTURE_BASE_KIND_NAME,
            Self::Overlay(kind) => kind.name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if name == CAPTURE_BASE_KIND_NAME {
            return Some(Self::CaptureBase);
        }
        OverlayKind::from_name(name).map(Self::Overlay)
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Capture base payload without its digest and type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureBaseCommand {
    pub classification: String,
    pub attributes: BTreeMap<String, AttributeType>,
    pub flagged_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CaptureBase(CaptureBaseCommand),
    Overlay(OverlayContent),
}

impl Command {
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            Self::CaptureBase(_) => ObjectKind::CaptureBase,
            Self::Overlay(content) => ObjectKind::Overlay(content.kind()),
        }
    }

    pub fn to_value(&self) -> OcaResult<Value> {
        let mut object = match self {
            Self::CaptureBase(command) => match serde_json::to_value(command)? {
                Value::Object(object) => object,
                _ => Map::new(),
            },
            Self::Overlay(content) => content.to_fields()?,
        };
        object.insert(
            OBJECT_KIND_FIELD.to_string(),
            Value::String(self.object_kind().name().to_string()),
        );
        Ok(Value::Object(object))
    }

    pub fn from_value(value: &Value) -> OcaResult<Self> {
        let mut object = value
            .as_object()
            .cloned()
            .ok_or_else(|| OcaError::Structural("command must be an object".to_string()))?;
        let name = match object.remove(OBJECT_KIND_FIELD) {
            Some(Value::String(name)) => name,
            _ => {
                return Err(OcaError::Structural(
                    "command is missing its object_kind".to_string(),
                ))
            }
        };
        match ObjectKind::from_name(&name) {
            Some(ObjectKind::CaptureBase) => serde_json::from_value(Value::Object(object))
                .map(Self::CaptureBase)
                .map_err(|err| OcaError::Structural(format!("invalid CaptureBase command: {err}"))),
            Some(ObjectKind::Overlay(kind)) => {
                OverlayContent::from_fields(kind, object).map(Self::Overlay)
            }
            None => Err(OcaError::Structural(format!("unknown object_kind `{name}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcaAst {
    pub version: String,
    pub commands: Vec<Command>,
}

impl OcaAst {
    pub fn from_bundle(bundle: &Bundle) -> Self {
        let capture_base = &bundle.capture_base;
        let mut commands = vec![Command::CaptureBase(CaptureBaseCommand {
            classification: capture_base.classification.clone(),
            attributes: capture_base.attributes.clone(),
            flagged_attributes: capture_base.flagged_attributes.clone(),
        })];
        let mut overlays: Vec<&Overlay> = bundle.overlays.iter().collect();
        overlays.sort_by_key(|overlay| overlay.kind());
        commands.extend(
            overlays
                .into_iter()
                .map(|overlay| Command::Overlay(overlay.content.clone())),
        );
        info!(
            "event=ast_export module=ast status=ok commands={}",
            commands.len()
        );
        Self {
            version: AST_VERSION.to_string(),
            commands,
        }
    }

    pub fn to_value(&self) -> OcaResult<Value> {
        let commands = self
            .commands
            .iter()
            .map(Command::to_value)
            .collect::<OcaResult<Vec<_>>>()?;
        let mut object = Map::new();
        object.insert("version".to_string(), Value::String(self.version.clone()));
        object.insert("commands".to_string(), Value::Array(commands));
        Ok(Value::Object(object))
    }

    pub fn from_value(value: &Value) -> OcaResult<Self> {
        let version = value
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| OcaError::Structural("ast is missing its version".to_string()))?;
        let commands = match value.get("commands") {
            Some(Value::Array(items)) => items
                .iter()
                .map(Command::from_value)
                .collect::<OcaResult<Vec<_>>>()?,
            _ => {
                return Err(OcaError::Structural(
                    "ast commands must be an ordered sequence".to_string(),
                ))
            }
        };
        Ok(Self {
            version: version.to_string(),
            commands,
        })
    }

    /// Rebuilds and digests the bundle described by the commands.
    ///
    /// # Errors
    /// - `Structural` for an unsupported version, a missing or repeated
    ///   capture base command, or a capture base that is not first.
    pub fn replay(&self) -> OcaResult<Bundle> {
        if self.version != AST_VERSION {
            return Err(OcaError::Structural(format!(
                "unsupported ast version `{}`; expected `{AST_VERSION}`",
                self.version
            )));
        }
        let (first, rest) = self
            .commands
            .split_first()
            .ok_or_else(|| OcaError::Structural("ast has no commands".to_string()))?;
        let Command::CaptureBase(base) = first else {
            return Err(OcaError::Structural(
                "first command must create the capture base".to_string(),
            ));
        };

        let mut capture_base = CaptureBase::new(base.classification.clone());
        capture_base.attributes = base.attributes.clone();
        capture_base.flagged_attributes = base.flagged_attributes.clone();
        let capture_base_said = stamp(&mut capture_base)?;

        let mut overlays = Vec::with_capacity(rest.len());
        for command in rest {
            let Command::Overlay(content) = command else {
                return Err(OcaError::Structural(
                    "capture base command may appear only once".to_string(),
                ));
            };
            let mut overlay = Overlay::new(content.clone());
            overlay.capture_base = Some(capture_base_said.clone());
            stamp(&mut overlay)?;
            overlays.push(overlay);
        }

        let mut bundle = Bundle {
            d: None,
            capture_base,
            overlays,
        };
        let said = stamp(&mut bundle)?;
        info!(
            "event=ast_replay module=ast status=ok commands={} said={}",
            self.commands.len(),
            said
        );
        Ok(bundle)
    }
}

impl Serialize for OcaAst {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OcaAst {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}
