//! Match confidence levels.
//!
//! Confidence is a discrete, totally ordered classification of how certain a
//! link between a record and a canonical contact is:
//! `Exact > High > Medium > Low > None`. Callers gate merges by comparing a
//! match's confidence against their own minimum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How certain a match is.
///
/// Variants are declared from weakest to strongest so the derived ordering
/// matches the confidence ordering.
///
/// # Examples
///
/// ```
/// use contactlink::Confidence;
///
/// assert!(Confidence::Exact > Confidence::High);
/// assert!(Confidence::Medium.meets(Confidence::Low));
/// assert!(!Confidence::Low.meets(Confidence::Medium));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// No usable signal linked the record to a contact.
    None,
    /// Name-only similarity.
    Low,
    /// Shared phone with a divergent name, or name plus company.
    Medium,
    /// Shared phone with a correlated name.
    High,
    /// Email identity match.
    Exact,
}

impl Confidence {
    /// All levels, strongest first.
    pub const ALL: [Self; 5] = [Self::Exact, Self::High, Self::Medium, Self::Low, Self::None];

    /// Returns true if this level is at least `minimum`.
    #[must_use]
    pub fn meets(self, minimum: Self) -> bool {
        self >= minimum
    }

    /// MEDIUM and LOW are returned rather than raised; the caller decides
    /// whether to accept them.
    #[must_use]
    pub const fn is_ambiguous(self) -> bool {
        matches!(self, Self::Medium | Self::Low)
    }

    /// Lowercase name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "none" => Ok(Self::None),
            other => Err(ValidationError::InvalidConfig {
                reason: format!("unknown confidence level '{other}'"),
            }),
        }
    }
}
