//! Attribute type parser.
//!
//! # Responsibility
//! - Turn a type descriptor (scalar name, `refs:` reference, or a one-element
//!   sequence wrapping either) into a typed tree.
//! - Render the tree back into the descriptor form stored in capture bases.
//!
//! # Invariants
//! - Parsing is pure: equal descriptors always yield equal trees.
//! - A `Reference` node always holds a decodable identifier; malformed
//!   references are rejected here, never later.
//! - `Array` holds its element type behind a `Box`, so nesting depth does not
//!   change the size of `AttributeType`.

use crate::digest::identifier::{Said, SaidError};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Prefix marking a descriptor as a reference to another capture base.
pub const REFERENCE_PREFIX: &str = "refs";

/// Maximum array nesting accepted from external descriptors.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Scalar attribute types recognized by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarType {
    Boolean,
    Binary,
    Text,
    Numeric,
    DateTime,
    /// Untargeted reference; the target comes from the attribute's
    /// `reference_sai`.
    Reference,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        Self::Boolean,
        Self::Binary,
        Self::Text,
        Self::Numeric,
        Self::DateTime,
        Self::Reference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Binary => "Binary",
            Self::Text => "Text",
            Self::Numeric => "Numeric",
            Self::DateTime => "DateTime",
            Self::Reference => "Reference",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scalar| scalar.as_str() == name)
    }
}

/// Typed attribute type tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Scalar(ScalarType),
    Reference(Said),
    Array(Box<AttributeType>),
}

impl AttributeType {
    /// Wraps `inner` in one array level.
    pub fn array(inner: AttributeType) -> Self {
        Self::Array(Box::new(inner))
    }

    /// Parses a structural type descriptor.
    ///
    /// # Errors
    /// - `UnknownType` when a scalar name is not recognized.
    /// - `InvalidReference` when a `refs:` identifier does not decode.
    /// - `MalformedArray` when a sequence does not hold exactly one element.
    /// - `UnsupportedDescriptor` for numbers, objects, booleans and null.
    pub fn parse(descriptor: &Value) -> Result<Self, AttributeTypeError> {
        parse_at_depth(descriptor, 0).inspect_err(|err| {
            debug!(
                "event=attribute_type_parse module=model status=error reason={}",
                err.reason()
            );
        })
    }

    /// Parses the string form of a descriptor (scalar name or reference).
    pub fn parse_str(descriptor: &str) -> Result<Self, AttributeTypeError> {
        Self::parse(&Value::String(descriptor.to_string()))
    }

    /// Structural descriptor as stored in a capture base.
    pub fn to_descriptor(&self) -> Value {
        match self {
            Self::Scalar(scalar) => Value::String(scalar.as_str().to_string()),
            Self::Reference(said) => Value::String(format!("{REFERENCE_PREFIX}:{said}")),
            Self::Array(inner) => Value::Array(vec![inner.to_descriptor()]),
        }
    }

    /// Number of array levels wrapped around the element type.
    pub fn array_depth(&self) -> usize {
        match self {
            Self::Array(inner) => 1 + inner.array_depth(),
            Self::Scalar(_) | Self::Reference(_) => 0,
        }
    }

    /// Referenced capture base, looking through array levels.
    pub fn reference(&self) -> Option<&Said> {
        match self {
            Self::Reference(said) => Some(said),
            Self::Array(inner) => inner.reference(),
            Self::Scalar(_) => None,
        }
    }
}

fn parse_at_depth(descriptor: &Value, depth: usize) -> Result<AttributeType, AttributeTypeError> {
    match descriptor {
        Value::String(text) => parse_name(text),
        Value::Array(items) => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(AttributeTypeError::NestingTooDeep {
                    max: MAX_NESTING_DEPTH,
                });
            }
            match items.as_slice() {
                [inner] => Ok(AttributeType::array(parse_at_depth(inner, depth + 1)?)),
                _ => Err(AttributeTypeError::MalformedArray { len: items.len() }),
            }
        }
        Value::Null => Err(AttributeTypeError::UnsupportedDescriptor("null")),
        Value::Bool(_) => Err(AttributeTypeError::UnsupportedDescriptor("boolean")),
        Value::Number(_) => Err(AttributeTypeError::UnsupportedDescriptor("number")),
        Value::Object(_) => Err(AttributeTypeError::UnsupportedDescriptor("object")),
    }
}

fn parse_name(text: &str) -> Result<AttributeType, AttributeTypeError> {
    if let Some((prefix, rest)) = text.split_once(':') {
        if prefix != REFERENCE_PREFIX {
            return Err(AttributeTypeError::UnknownType(text.to_string()));
        }
        return rest
            .parse::<Said>()
            .map(AttributeType::Reference)
            .map_err(|source| AttributeTypeError::InvalidReference {
                reference: rest.to_string(),
                source,
            });
    }
    ScalarType::from_name(text)
        .map(AttributeType::Scalar)
        .ok_or_else(|| AttributeTypeError::UnknownType(text.to_string()))
}

impl FromStr for AttributeType {
    type Err = AttributeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl From<ScalarType> for AttributeType {
    fn from(value: ScalarType) -> Self {
        Self::Scalar(value)
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(scalar) => f.write_str(scalar.as_str()),
            Self::Reference(said) => write!(f, "{REFERENCE_PREFIX}:{said}"),
            Self::Array(inner) => write!(f, "Array[{inner}]"),
        }
    }
}

impl Serialize for AttributeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_descriptor().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttributeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let descriptor = Value::deserialize(deserializer)?;
        Self::parse(&descriptor).map_err(serde::de::Error::custom)
    }
}

/// Type descriptor parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeTypeError {
    UnknownType(String),
    InvalidReference { reference: String, source: SaidError },
    MalformedArray { len: usize },
    UnsupportedDescriptor(&'static str),
    NestingTooDeep { max: usize },
}

impl AttributeTypeError {
    fn reason(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "unknown_type",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::MalformedArray { .. } => "malformed_array",
            Self::UnsupportedDescriptor(_) => "unsupported_descriptor",
            Self::NestingTooDeep { .. } => "nesting_too_deep",
        }
    }
}

impl Display for AttributeTypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(name) => write!(f, "Attribute type {name} doesn't exist"),
            Self::InvalidReference { source, .. } => write!(f, "Invalid said: {source}"),
            Self::MalformedArray { len } => write!(
                f,
                "array type must wrap exactly one element type, got {len}"
            ),
            Self::UnsupportedDescriptor(kind) => {
                write!(f, "unsupported attribute type descriptor: {kind}")
            }
            Self::NestingTooDeep { max } => {
                write!(f, "array nesting exceeds {max} levels")
            }
        }
    }
}

impl Error for AttributeTypeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidReference { source, .. } => Some(source),
            _ => None,
        }
    }
}
