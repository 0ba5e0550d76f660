//! Self-addressing identifier (SAID) wrapper.
//!
//! # Responsibility
//! - Derive identifiers with the `said` crate (Blake3-256) and expose them as
//!   an ordered, hashable value type.
//! - Decode and validate identifiers produced by any compliant tool.
//!
//! # Invariants
//! - A `Said` value is always decodable; malformed text never becomes a `Said`.
//! - Equality, ordering and hashing follow the identifier text.

use said::derivation::{HashFunction, HashFunctionCode};
use said::SelfAddressingIdentifier;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Character used to fill the digest field while the digest is computed.
pub const PLACEHOLDER_CHAR: char = '#';

/// Width of identifiers produced by the digest engine (Blake3-256).
pub const SAID_TEXT_LEN: usize = 44;

/// Decoding errors for identifier text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaidError {
    Empty,
    InvalidCharacter(char),
    Malformed(String),
}

impl Display for SaidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty identifier"),
            Self::InvalidCharacter(c) => write!(f, "Invalid character `{c}`"),
            Self::Malformed(reason) => write!(f, "{reason}"),
        }
    }
}

impl Error for SaidError {}

/// Content-derived identifier of a capture base, overlay or bundle.
#[derive(Debug, Clone)]
pub struct Said {
    inner: SelfAddressingIdentifier,
    text: String,
}

impl Said {
    /// Computes the Blake3-256 identifier of `data`.
    pub fn blake3_256(data: &[u8]) -> Self {
        let inner = HashFunction::from(HashFunctionCode::Blake3_256).derive(data);
        let text = inner.to_string();
        Self { inner, text }
    }

    /// Fixed-width placeholder occupying the same width as a Blake3-256 said.
    pub fn placeholder() -> String {
        std::iter::repeat(PLACEHOLDER_CHAR)
            .take(SAID_TEXT_LEN)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub fn as_identifier(&self) -> &SelfAddressingIdentifier {
        &self.inner
    }

    /// Whether this identifier is the digest of `data` under its own code.
    pub fn verify_binding(&self, data: &[u8]) -> bool {
        self.inner.verify_binding(data)
    }
}

impl FromStr for Said {
    type Err = SaidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(SaidError::Empty);
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SaidError::InvalidCharacter(bad));
        }
        let inner = SelfAddressingIdentifier::from_str(s)
            .map_err(|err| SaidError::Malformed(err.to_string()))?;
        Ok(Self {
            inner,
            text: s.to_string(),
        })
    }
}

impl PartialEq for Said {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Said {}

impl PartialOrd for Said {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Said {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl Hash for Said {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Display for Said {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Said {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Said {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse::<Said>()
            .map_err(|err| serde::de::Error::custom(format!("Invalid said: {err}")))
    }
}
