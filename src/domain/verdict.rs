use serde::{Deserialize, Serialize};
use std::fmt;

use super::evidence::Evidence;

/// Eligibility verdict with severity ordering.
///
/// When several rules fail, the most severe verdict wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Verdict {
    /// Every applicable rule passed
    Approve = 0,
    /// Flagged for manual review
    Review = 1,
    /// Rejected
    Reject = 2,
}

impl Verdict {
    /// Returns the more severe of two verdicts.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }

    #[inline]
    pub fn is_approved(&self) -> bool {
        *self == Verdict::Approve
    }

    /// Parse from string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "APPROVE" => Some(Verdict::Approve),
            "REVIEW" => Some(Verdict::Review),
            "REJECT" => Some(Verdict::Reject),
            _ => None,
        }
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::Reject
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approve => write!(f, "APPROVE"),
            Verdict::Review => write!(f, "REVIEW"),
            Verdict::Reject => write!(f, "REJECT"),
        }
    }
}

/// Result of evaluating one offer's eligibility.
///
/// A non-approved decision always carries at least one reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub approved: bool,
    pub verdict: Verdict,
    pub reasons: Vec<String>,

    /// Rule set that was applied, as `PRODUCT/CAMPAIGN`
    #[serde(default)]
    pub rule_set: Option<String>,

    #[serde(default)]
    pub rule_book_version: Option<String>,

    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl EligibilityDecision {
    /// Fail-closed rejection with a single reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        EligibilityDecision {
            approved: false,
            verdict: Verdict::Reject,
            reasons: vec![reason.into()],
            rule_set: None,
            rule_book_version: None,
            evidence: Vec::new(),
        }
    }
}
