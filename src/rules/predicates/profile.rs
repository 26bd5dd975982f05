use std::collections::HashSet;

use crate::domain::{EligibilityFact, Evidence, RuleKind, RuleResult, Verdict};
use crate::rules::traits::EligibilityRule;

/// Requires a categorical fact attribute to be one of a configured set.
///
/// Comparison is case-insensitive; a missing attribute fails the rule.
#[derive(Debug)]
pub struct AllowListRule {
    id: String,
    kind: RuleKind,
    allowed: HashSet<String>,
    reason: String,
    action: Verdict,
}

impl AllowListRule {
    pub fn new(
        id: String,
        kind: RuleKind,
        allowed: impl IntoIterator<Item = String>,
        reason: String,
        action: Verdict,
    ) -> Self {
        AllowListRule {
            id,
            kind,
            allowed: allowed
                .into_iter()
                .map(|v| v.trim().to_uppercase())
                .collect(),
            reason,
            action,
        }
    }

    fn read<'a>(&self, fact: &'a EligibilityFact) -> (&'static str, Option<&'a str>) {
        match self.kind {
            RuleKind::AllowedResidenceTypes => ("residence_type", fact.residence_type.as_deref()),
            _ => ("employment_type", fact.employment_type.as_deref()),
        }
    }
}

impl EligibilityRule for AllowListRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, fact: &EligibilityFact) -> RuleResult {
        let (key, value) = self.read(fact);

        match value {
            Some(v) if self.allowed.contains(&v.to_uppercase()) => RuleResult::pass(),
            other => RuleResult::fail(
                self.action,
                self.reason.clone(),
                Evidence::new(&self.id, key, other.unwrap_or("missing")),
            ),
        }
    }
}

/// Requires the customer to have had a profile before this record arrived.
#[derive(Debug)]
pub struct Customer360Rule {
    id: String,
    reason: String,
    action: Verdict,
}

impl Customer360Rule {
    pub fn new(id: String, reason: String, action: Verdict) -> Self {
        Customer360Rule { id, reason, action }
    }
}

impl EligibilityRule for Customer360Rule {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, fact: &EligibilityFact) -> RuleResult {
        if fact.is_customer360_profile_exists {
            RuleResult::pass()
        } else {
            RuleResult::fail(
                self.action,
                self.reason.clone(),
                Evidence::new(&self.id, "is_customer360_profile_exists", "false"),
            )
        }
    }
}
