use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of characters the excuse input must contain before it is submitted.
pub const MIN_INPUT_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcuseCategory {
    #[default]
    Medical,
    Familiar,
    Overlapping,
}

impl ExcuseCategory {
    pub const ALL: [ExcuseCategory; 3] = [Self::Medical, Self::Familiar, Self::Overlapping];

    /// Wire key, also used as the context marker inside the generation prompt.
    pub fn key(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Familiar => "familiar",
            Self::Overlapping => "overlapping",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Medical => "Vague medical issue",
            Self::Familiar => "Random familiar celebration",
            Self::Overlapping => "Overlapping with other event",
        }
    }
}

impl fmt::Display for ExcuseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown excuse category '{0}' (expected medical, familiar or overlapping)")]
pub struct UnknownCategory(pub String);

impl FromStr for ExcuseCategory {
    type Err = UnknownCategory;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.key().eq_ignore_ascii_case(raw))
            .ok_or_else(|| UnknownCategory(raw.to_string()))
    }
}
