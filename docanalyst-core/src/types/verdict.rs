//! Validator verdicts.

use serde::{Deserialize, Serialize};

/// Outcome of checking a candidate query or summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reasons", rename_all = "snake_case")]
pub enum Verdict {
    /// Every check passed.
    Valid,
    /// At least one check failed; reasons are kept in the order they were found.
    Invalid(Vec<String>),
}

impl Verdict {
    /// Build an invalid verdict with a single reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(vec![reason.into()])
    }

    /// Build a verdict from collected reasons: none means valid.
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(reasons)
        }
    }

    /// Whether the verdict is `Valid`.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Reasons for invalidity; empty when valid.
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Valid => &[],
            Self::Invalid(reasons) => reasons,
        }
    }
}
