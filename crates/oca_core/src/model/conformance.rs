//! Whether a value must be supplied when data is captured.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Conformance {
    #[serde(rename = "O")]
    Optional,
    #[serde(rename = "M")]
    Mandatory,
}

impl Conformance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "O",
            Self::Mandatory => "M",
        }
    }
}

impl Display for Conformance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
