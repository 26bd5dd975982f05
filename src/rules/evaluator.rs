use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{EligibilityDecision, EligibilityFact};

use super::RuleRegistry;

/// Reason reported when no rule set covers an offer.
pub const NO_RULE_SET_CONFIGURED: &str = "NO_RULE_SET_CONFIGURED";

/// Evaluates eligibility facts against the currently installed rule book.
///
/// The registry can be swapped at runtime; each evaluation works on the
/// registry that was current when it started.
#[derive(Debug)]
pub struct RuleEvaluator {
    registry: RwLock<Arc<RuleRegistry>>,
}

impl RuleEvaluator {
    pub fn new(registry: RuleRegistry) -> Self {
        RuleEvaluator {
            registry: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry in force right now.
    pub fn current(&self) -> Arc<RuleRegistry> {
        self.registry.read().clone()
    }

    /// Replace the registry. In-flight evaluations keep the old one.
    pub fn install(&self, registry: RuleRegistry) {
        *self.registry.write() = Arc::new(registry);
    }

    /// Approve, reject or flag an offer for review.
    ///
    /// Fails closed: without a configured rule set the offer is rejected
    /// with `NO_RULE_SET_CONFIGURED`.
    pub fn evaluate(&self, fact: &EligibilityFact) -> EligibilityDecision {
        let registry = self.current();

        let mut decision = match registry.lookup(&fact.product_type, &fact.campaign_id) {
            Ok(rule_set) => rule_set.evaluate(fact),
            Err(e) => {
                warn!(
                    offer_id = %fact.offer_id,
                    error = %e,
                    "Rejecting offer without rule set"
                );
                EligibilityDecision::rejected(NO_RULE_SET_CONFIGURED)
            }
        };
        decision.rule_book_version = Some(registry.version.clone());

        debug!(
            offer_id = %fact.offer_id,
            verdict = %decision.verdict,
            reasons = ?decision.reasons,
            "Eligibility evaluated"
        );

        decision
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        RuleEvaluator::new(RuleRegistry::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProductType, RuleBook, Verdict};
    use crate::rules::predicates::test_fact;

    fn registry(min_score: u32) -> RuleRegistry {
        let yaml = format!(
            r#"
rule_book_version: "v{min_score}"
rule_sets:
  - product_type: PREAPPROVED
    rules:
      - id: MIN_SCORE
        type: min_credit_score
        threshold: {min_score}
"#
        );
        let book: RuleBook = serde_yaml::from_str(&yaml).unwrap();
        RuleRegistry::from_rule_book(&book).unwrap()
    }

    #[test]
    fn test_no_rule_set_fails_closed() {
        let evaluator = RuleEvaluator::new(registry(700));

        let mut fact = test_fact();
        fact.product_type = ProductType::Other("NEW_PRODUCT".to_string());
        fact.campaign_id = "X".to_string();

        let decision = evaluator.evaluate(&fact);
        assert!(!decision.approved);
        assert_eq!(decision.verdict, Verdict::Reject);
        assert!(decision.reasons.contains(&NO_RULE_SET_CONFIGURED.to_string()));
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let evaluator = RuleEvaluator::default();
        let decision = evaluator.evaluate(&test_fact());
        assert!(!decision.approved);
        assert_eq!(decision.rule_book_version.as_deref(), Some("0.0.0"));
    }

    #[test]
    fn test_install_swaps_registry() {
        let evaluator = RuleEvaluator::new(registry(700));
        let fact = test_fact(); // credit score 760

        assert!(evaluator.evaluate(&fact).approved);

        evaluator.install(registry(800));
        let decision = evaluator.evaluate(&fact);
        assert!(!decision.approved);
        assert_eq!(decision.rule_book_version.as_deref(), Some("v800"));
    }
}
