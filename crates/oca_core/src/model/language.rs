//! Language codes used to key translated overlay content.
//!
//! # Invariants
//! - A `Language` is always a registered ISO 639-3 language.
//! - Ordering is plain code ordering; it is used for digest input sorting.

use crate::error::{OcaError, OcaResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Validated ISO 639-3 language, e.g. `eng` or `pol`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(isolang::Language);

impl Language {
    /// Parses and normalizes a language code.
    ///
    /// Surrounding whitespace is trimmed and letters are lowercased, so
    /// `" ENG "` and `"eng"` name the same language.
    pub fn parse(value: &str) -> OcaResult<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        isolang::Language::from_639_3(&normalized)
            .map(Self)
            .ok_or_else(|| {
                OcaError::configuration(format!(
                    "invalid language code `{}`; expected an ISO 639-3 code",
                    value.trim()
                ))
            })
    }

    pub fn as_str(&self) -> &'static str {
        self.0.to_639_3()
    }

    pub fn iso(&self) -> isolang::Language {
        self.0
    }
}

impl From<isolang::Language> for Language {
    fn from(value: isolang::Language) -> Self {
        Self(value)
    }
}

impl PartialOrd for Language {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Language {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl FromStr for Language {
    type Err = OcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Language {
    type Error = OcaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.as_str().to_string()
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
