use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::offer::ProductType;
use super::Verdict;

/// Campaign id that matches every campaign of a product.
pub const ANY_CAMPAIGN: &str = "*";

/// Declarative eligibility configuration: rule sets keyed by product and campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleBook {
    /// Rule book version identifier
    #[serde(rename = "rule_book_version")]
    pub version: String,

    #[serde(default)]
    pub rule_sets: Vec<RuleSetDef>,
}

impl RuleBook {
    /// Create an empty rule book. Every offer is rejected under it.
    pub fn empty() -> Self {
        RuleBook {
            version: "0.0.0".to_string(),
            rule_sets: Vec::new(),
        }
    }
}

/// Ordered rules for one `(product_type, campaign_id)` combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDef {
    pub product_type: ProductType,

    /// Campaign id, or `*` for every campaign of the product
    #[serde(default = "any_campaign")]
    pub campaign_id: String,

    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

fn any_campaign() -> String {
    ANY_CAMPAIGN.to_string()
}

/// Rule predicate kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MinCreditScore,
    MaxExistingLoans,
    MinAge,
    MaxAge,
    MinMonthlyIncome,
    MinOfferAmount,
    MaxOfferAmount,
    MaxTenureMonths,
    MaxInterestRate,
    AllowedEmploymentTypes,
    AllowedResidenceTypes,
    RequireCustomer360Profile,
}

impl RuleKind {
    /// Reason code used when a rule definition does not name one.
    pub fn default_reason(&self) -> &'static str {
        match self {
            RuleKind::MinCreditScore => "CREDIT_SCORE_BELOW_MINIMUM",
            RuleKind::MaxExistingLoans => "TOO_MANY_EXISTING_LOANS",
            RuleKind::MinAge => "AGE_BELOW_MINIMUM",
            RuleKind::MaxAge => "AGE_ABOVE_MAXIMUM",
            RuleKind::MinMonthlyIncome => "INCOME_BELOW_MINIMUM",
            RuleKind::MinOfferAmount => "OFFER_AMOUNT_BELOW_MINIMUM",
            RuleKind::MaxOfferAmount => "OFFER_AMOUNT_ABOVE_CAP",
            RuleKind::MaxTenureMonths => "TENURE_ABOVE_CAP",
            RuleKind::MaxInterestRate => "INTEREST_RATE_ABOVE_CAP",
            RuleKind::AllowedEmploymentTypes => "EMPLOYMENT_TYPE_NOT_ALLOWED",
            RuleKind::AllowedResidenceTypes => "RESIDENCE_TYPE_NOT_ALLOWED",
            RuleKind::RequireCustomer360Profile => "CUSTOMER_360_PROFILE_MISSING",
        }
    }

    /// True for kinds that compare against a numeric threshold.
    pub fn needs_threshold(&self) -> bool {
        !matches!(
            self,
            RuleKind::AllowedEmploymentTypes
                | RuleKind::AllowedResidenceTypes
                | RuleKind::RequireCustomer360Profile
        )
    }

    /// True for kinds that compare against a list of allowed values.
    pub fn needs_values(&self) -> bool {
        matches!(
            self,
            RuleKind::AllowedEmploymentTypes | RuleKind::AllowedResidenceTypes
        )
    }
}

/// Definition of a single eligibility rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    /// Unique rule identifier within its rule set
    pub id: String,

    #[serde(rename = "type")]
    pub kind: RuleKind,

    /// Numeric threshold for comparison kinds
    #[serde(default)]
    pub threshold: Option<Decimal>,

    /// Allowed values for list kinds
    #[serde(default)]
    pub values: Vec<String>,

    /// Reason code reported on failure
    #[serde(default)]
    pub reason: Option<String>,

    /// Verdict contributed on failure
    #[serde(default)]
    pub action: Verdict,
}

impl RuleDef {
    /// The reason code reported when this rule fails.
    pub fn reason_code(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| self.kind.default_reason().to_string())
    }
}
