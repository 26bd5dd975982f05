use rust_decimal::Decimal;

use crate::domain::{EligibilityFact, Evidence, RuleKind, RuleResult, Verdict};
use crate::rules::traits::EligibilityRule;

/// Which side of the threshold a fact value must fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// value >= threshold
    AtLeast,
    /// value <= threshold
    AtMost,
}

/// Numeric comparison of one fact attribute against a configured threshold.
///
/// A missing attribute fails the rule.
#[derive(Debug)]
pub struct ThresholdRule {
    id: String,
    kind: RuleKind,
    threshold: Decimal,
    reason: String,
    action: Verdict,
}

impl ThresholdRule {
    pub fn new(id: String, kind: RuleKind, threshold: Decimal, reason: String, action: Verdict) -> Self {
        ThresholdRule {
            id,
            kind,
            threshold,
            reason,
            action,
        }
    }

    fn bound(&self) -> Bound {
        match self.kind {
            RuleKind::MinCreditScore
            | RuleKind::MinAge
            | RuleKind::MinMonthlyIncome
            | RuleKind::MinOfferAmount => Bound::AtLeast,
            _ => Bound::AtMost,
        }
    }

    /// Attribute name and value this rule reads from the fact.
    fn read(&self, fact: &EligibilityFact) -> (&'static str, Option<Decimal>) {
        match self.kind {
            RuleKind::MinCreditScore => ("credit_score", fact.credit_score.map(Decimal::from)),
            RuleKind::MaxExistingLoans => (
                "existing_loan_count",
                fact.existing_loan_count.map(Decimal::from),
            ),
            RuleKind::MinAge | RuleKind::MaxAge => ("age_years", fact.age_years.map(Decimal::from)),
            RuleKind::MinMonthlyIncome => ("monthly_income", fact.monthly_income),
            RuleKind::MinOfferAmount | RuleKind::MaxOfferAmount => {
                ("offer_amount", Some(fact.offer_amount))
            }
            RuleKind::MaxTenureMonths => ("tenure_months", Some(Decimal::from(fact.tenure_months))),
            RuleKind::MaxInterestRate => ("interest_rate", Some(fact.interest_rate)),
            RuleKind::AllowedEmploymentTypes
            | RuleKind::AllowedResidenceTypes
            | RuleKind::RequireCustomer360Profile => ("unsupported", None),
        }
    }
}

impl EligibilityRule for ThresholdRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, fact: &EligibilityFact) -> RuleResult {
        let (key, value) = self.read(fact);

        let Some(value) = value else {
            return RuleResult::fail(
                self.action,
                self.reason.clone(),
                Evidence::with_limit(&self.id, key, "missing", self.threshold.to_string()),
            );
        };

        let holds = match self.bound() {
            Bound::AtLeast => value >= self.threshold,
            Bound::AtMost => value <= self.threshold,
        };

        if holds {
            RuleResult::pass()
        } else {
            RuleResult::fail(
                self.action,
                self.reason.clone(),
                Evidence::with_limit(&self.id, key, value.to_string(), self.threshold.to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::predicates::test_fact;

    fn rule(kind: RuleKind, threshold: i64) -> ThresholdRule {
        ThresholdRule::new(
            "R".to_string(),
            kind,
            Decimal::new(threshold, 0),
            kind.default_reason().to_string(),
            Verdict::Reject,
        )
    }

    #[test]
    fn test_min_credit_score() {
        let mut fact = test_fact();
        fact.credit_score = Some(700);
        assert!(rule(RuleKind::MinCreditScore, 700).evaluate(&fact).passed);

        fact.credit_score = Some(699);
        let result = rule(RuleKind::MinCreditScore, 700).evaluate(&fact);
        assert!(!result.passed);
        assert_eq!(result.reason.as_deref(), Some("CREDIT_SCORE_BELOW_MINIMUM"));
        let ev = result.evidence.unwrap();
        assert_eq!(ev.value, "699");
        assert_eq!(ev.limit, Some("700".to_string()));
    }

    #[test]
    fn test_missing_value_fails_closed() {
        let mut fact = test_fact();
        fact.credit_score = None;

        let result = rule(RuleKind::MinCreditScore, 600).evaluate(&fact);
        assert!(!result.passed);
        assert_eq!(result.evidence.unwrap().value, "missing");
    }

    #[test]
    fn test_max_existing_loans() {
        let mut fact = test_fact();
        fact.existing_loan_count = Some(3);
        assert!(rule(RuleKind::MaxExistingLoans, 3).evaluate(&fact).passed);

        fact.existing_loan_count = Some(4);
        assert!(!rule(RuleKind::MaxExistingLoans, 3).evaluate(&fact).passed);
    }

    #[test]
    fn test_age_window() {
        let mut fact = test_fact();
        fact.age_years = Some(20);
        assert!(!rule(RuleKind::MinAge, 21).evaluate(&fact).passed);
        assert!(rule(RuleKind::MaxAge, 60).evaluate(&fact).passed);
    }

    #[test]
    fn test_product_caps() {
        let fact = test_fact();
        // test_fact offers 200000 over 36 months
        assert!(rule(RuleKind::MaxOfferAmount, 200000).evaluate(&fact).passed);
        assert!(!rule(RuleKind::MaxOfferAmount, 199999).evaluate(&fact).passed);
        assert!(!rule(RuleKind::MaxTenureMonths, 24).evaluate(&fact).passed);
        assert!(rule(RuleKind::MinOfferAmount, 50000).evaluate(&fact).passed);
    }

    #[test]
    fn test_review_action_propagates() {
        let mut fact = test_fact();
        fact.monthly_income = Some(Decimal::new(20000, 0));
        let rule = ThresholdRule::new(
            "INCOME".to_string(),
            RuleKind::MinMonthlyIncome,
            Decimal::new(25000, 0),
            "INCOME_NEEDS_REVIEW".to_string(),
            Verdict::Review,
        );

        let result = rule.evaluate(&fact);
        assert_eq!(result.verdict, Verdict::Review);
        assert_eq!(result.reason.as_deref(), Some("INCOME_NEEDS_REVIEW"));
    }
}
