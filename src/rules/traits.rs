use std::fmt::Debug;

use crate::domain::{EligibilityFact, RuleResult};

/// A side-effect-free eligibility predicate.
///
/// Rules see only the fact they are handed and keep no state between
/// evaluations, so they can be shared freely across threads.
pub trait EligibilityRule: Send + Sync + Debug {
    /// Unique identifier for this rule within its rule set.
    fn id(&self) -> &str;

    /// Evaluate the rule against a fact.
    ///
    /// A failing rule returns its verdict, reason code and evidence.
    fn evaluate(&self, fact: &EligibilityFact) -> RuleResult;
}
