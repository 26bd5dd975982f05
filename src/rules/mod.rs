pub mod evaluator;
pub mod predicates;
pub mod traits;

pub use evaluator::RuleEvaluator;
pub use predicates::{AllowListRule, Customer360Rule, ThresholdRule};
pub use traits::EligibilityRule;

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{
    EligibilityDecision, EligibilityFact, ProductType, RuleBook, RuleDef, RuleSetDef, Verdict,
    ANY_CAMPAIGN,
};
use crate::error::ConfigurationError;

/// Ordered, compiled rules for one product/campaign combination.
///
/// Rules form a conjunction: every rule runs, and each failure adds its
/// reason so a rejection is always explainable.
#[derive(Debug)]
pub struct RuleSet {
    pub product_type: ProductType,
    pub campaign_id: String,
    pub rules: Vec<Arc<dyn EligibilityRule>>,
}

impl RuleSet {
    /// Compile a rule set definition.
    pub fn from_def(def: &RuleSetDef) -> Result<Self, ConfigurationError> {
        let rules = def
            .rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleSet {
            product_type: def.product_type.clone(),
            campaign_id: def.campaign_id.clone(),
            rules,
        })
    }

    /// `PRODUCT/CAMPAIGN` label for audit output.
    pub fn label(&self) -> String {
        format!("{}/{}", self.product_type, self.campaign_id)
    }

    /// Evaluate every rule against the fact.
    pub fn evaluate(&self, fact: &EligibilityFact) -> EligibilityDecision {
        let mut verdict = Verdict::Approve;
        let mut reasons = Vec::new();
        let mut evidence = Vec::new();

        for rule in &self.rules {
            let result = rule.evaluate(fact);
            if result.passed {
                continue;
            }
            verdict = verdict.max(result.verdict);
            if let Some(reason) = result.reason {
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
            }
            if let Some(ev) = result.evidence {
                evidence.push(ev);
            }
        }

        EligibilityDecision {
            approved: verdict.is_approved(),
            verdict,
            reasons,
            rule_set: Some(self.label()),
            rule_book_version: None,
            evidence,
        }
    }
}

/// Build one rule from its definition.
fn compile_rule(def: &RuleDef) -> Result<Arc<dyn EligibilityRule>, ConfigurationError> {
    if def.action.is_approved() {
        return Err(ConfigurationError::ApproveOnFailure {
            rule_id: def.id.clone(),
        });
    }

    let reason = def.reason_code();

    let rule: Arc<dyn EligibilityRule> = if def.kind.needs_values() {
        if def.values.is_empty() {
            return Err(ConfigurationError::MissingValues {
                rule_id: def.id.clone(),
            });
        }
        Arc::new(AllowListRule::new(
            def.id.clone(),
            def.kind,
            def.values.clone(),
            reason,
            def.action,
        ))
    } else if def.kind.needs_threshold() {
        let threshold = def.threshold.ok_or_else(|| ConfigurationError::MissingThreshold {
            rule_id: def.id.clone(),
        })?;
        Arc::new(ThresholdRule::new(
            def.id.clone(),
            def.kind,
            threshold,
            reason,
            def.action,
        ))
    } else {
        Arc::new(Customer360Rule::new(def.id.clone(), reason, def.action))
    };

    Ok(rule)
}

/// Compiled rule book indexed by `(product_type, campaign_id)`.
#[derive(Debug)]
pub struct RuleRegistry {
    sets: HashMap<(ProductType, String), Arc<RuleSet>>,
    pub version: String,
}

impl RuleRegistry {
    /// Compile every rule set in a rule book.
    pub fn from_rule_book(book: &RuleBook) -> Result<Self, ConfigurationError> {
        let mut sets = HashMap::with_capacity(book.rule_sets.len());

        for def in &book.rule_sets {
            let set = RuleSet::from_def(def)?;
            sets.insert(
                (def.product_type.clone(), def.campaign_id.clone()),
                Arc::new(set),
            );
        }

        Ok(RuleRegistry {
            sets,
            version: book.version.clone(),
        })
    }

    /// A registry with no rule sets. Every lookup fails.
    pub fn empty() -> Self {
        RuleRegistry {
            sets: HashMap::new(),
            version: "0.0.0".to_string(),
        }
    }

    /// Find the rule set for a product and campaign.
    ///
    /// An exact campaign entry wins over the product's wildcard entry.
    pub fn lookup(
        &self,
        product_type: &ProductType,
        campaign_id: &str,
    ) -> Result<&Arc<RuleSet>, ConfigurationError> {
        self.sets
            .get(&(product_type.clone(), campaign_id.to_string()))
            .or_else(|| {
                self.sets
                    .get(&(product_type.clone(), ANY_CAMPAIGN.to_string()))
            })
            .ok_or_else(|| ConfigurationError::NoRuleSet {
                product_type: product_type.to_string(),
                campaign_id: campaign_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RuleKind;
    use crate::rules::predicates::test_fact;
    use rust_decimal::Decimal;

    fn rule_book() -> RuleBook {
        serde_yaml::from_str(
            r#"
rule_book_version: "test-1"
rule_sets:
  - product_type: PREAPPROVED
    rules:
      - id: MIN_SCORE
        type: min_credit_score
        threshold: 700
      - id: MAX_LOANS
        type: max_existing_loans
        threshold: 2
        action: REVIEW
  - product_type: PREAPPROVED
    campaign_id: CMP-VIP
    rules:
      - id: MIN_SCORE_VIP
        type: min_credit_score
        threshold: 800
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_registry_from_rule_book() {
        let registry = RuleRegistry::from_rule_book(&rule_book()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.version, "test-1");
    }

    #[test]
    fn test_lookup_prefers_exact_campaign() {
        let registry = RuleRegistry::from_rule_book(&rule_book()).unwrap();

        let vip = registry.lookup(&ProductType::Preapproved, "CMP-VIP").unwrap();
        assert_eq!(vip.campaign_id, "CMP-VIP");

        let other = registry.lookup(&ProductType::Preapproved, "CMP-1").unwrap();
        assert_eq!(other.campaign_id, ANY_CAMPAIGN);
    }

    #[test]
    fn test_lookup_missing_is_configuration_error() {
        let registry = RuleRegistry::from_rule_book(&rule_book()).unwrap();

        let err = registry
            .lookup(&ProductType::Other("NEW_PRODUCT".to_string()), "X")
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::NoRuleSet {
                product_type: "NEW_PRODUCT".to_string(),
                campaign_id: "X".to_string(),
            }
        );
    }

    #[test]
    fn test_conjunction_collects_every_failure() {
        let registry = RuleRegistry::from_rule_book(&rule_book()).unwrap();
        let set = registry.lookup(&ProductType::Preapproved, "CMP-1").unwrap();

        let mut fact = test_fact();
        fact.credit_score = Some(650);
        fact.existing_loan_count = Some(5);

        let decision = set.evaluate(&fact);
        assert!(!decision.approved);
        assert_eq!(decision.verdict, Verdict::Reject);
        assert_eq!(
            decision.reasons,
            vec![
                "CREDIT_SCORE_BELOW_MINIMUM".to_string(),
                "TOO_MANY_EXISTING_LOANS".to_string()
            ]
        );
        assert_eq!(decision.evidence.len(), 2);
        assert_eq!(decision.rule_set.as_deref(), Some("PREAPPROVED/*"));
    }

    #[test]
    fn test_review_only_failures() {
        let registry = RuleRegistry::from_rule_book(&rule_book()).unwrap();
        let set = registry.lookup(&ProductType::Preapproved, "CMP-1").unwrap();

        let mut fact = test_fact();
        fact.existing_loan_count = Some(5);

        let decision = set.evaluate(&fact);
        assert!(!decision.approved);
        assert_eq!(decision.verdict, Verdict::Review);
    }

    #[test]
    fn test_all_pass_approves() {
        let registry = RuleRegistry::from_rule_book(&rule_book()).unwrap();
        let set = registry.lookup(&ProductType::Preapproved, "CMP-1").unwrap();

        let decision = set.evaluate(&test_fact());
        assert!(decision.approved);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_compile_rejects_missing_threshold() {
        let def = RuleDef {
            id: "BAD".to_string(),
            kind: RuleKind::MaxOfferAmount,
            threshold: None,
            values: vec![],
            reason: None,
            action: Verdict::Reject,
        };
        assert_eq!(
            compile_rule(&def).unwrap_err(),
            ConfigurationError::MissingThreshold {
                rule_id: "BAD".to_string()
            }
        );
    }

    #[test]
    fn test_compile_rejects_approve_action() {
        let def = RuleDef {
            id: "SOFT".to_string(),
            kind: RuleKind::MaxOfferAmount,
            threshold: Some(Decimal::new(1, 0)),
            values: vec![],
            reason: None,
            action: Verdict::Approve,
        };
        assert!(matches!(
            compile_rule(&def),
            Err(ConfigurationError::ApproveOnFailure { .. })
        ));
    }
}
