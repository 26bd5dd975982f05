use serde::{Deserialize, Serialize};

use super::Verdict;

/// Evidence captured when an eligibility rule fails.
///
/// Provides an audit trail of which fact value broke which limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// The rule that failed
    pub rule_id: String,

    /// Fact attribute that was checked (e.g., "credit_score", "offer_amount")
    pub key: String,

    /// The fact value, or "missing"
    pub value: String,

    /// The threshold/limit that was violated (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

impl Evidence {
    pub fn new(rule_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Evidence {
            rule_id: rule_id.into(),
            key: key.into(),
            value: value.into(),
            limit: None,
        }
    }

    pub fn with_limit(
        rule_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        limit: impl Into<String>,
    ) -> Self {
        Evidence {
            rule_id: rule_id.into(),
            key: key.into(),
            value: value.into(),
            limit: Some(limit.into()),
        }
    }
}

/// Result of evaluating one eligibility rule.
#[derive(Debug, Clone)]
pub struct RuleResult {
    /// Whether the predicate held
    pub passed: bool,

    /// Verdict contributed when the rule failed
    pub verdict: Verdict,

    /// Reason code when the rule failed
    pub reason: Option<String>,

    /// Evidence when the rule failed
    pub evidence: Option<Evidence>,
}

impl RuleResult {
    /// The predicate held.
    #[inline]
    pub fn pass() -> Self {
        RuleResult {
            passed: true,
            verdict: Verdict::Approve,
            reason: None,
            evidence: None,
        }
    }

    /// The predicate failed.
    pub fn fail(verdict: Verdict, reason: impl Into<String>, evidence: Evidence) -> Self {
        RuleResult {
            passed: false,
            verdict,
            reason: Some(reason.into()),
            evidence: Some(evidence),
        }
    }
}

impl Default for RuleResult {
    fn default() -> Self {
        RuleResult::pass()
    }
}
