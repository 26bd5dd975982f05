mod profile;
mod threshold;

pub use profile::{AllowListRule, Customer360Rule};
pub use threshold::{Bound, ThresholdRule};

#[cfg(test)]
pub(crate) fn test_fact() -> crate::domain::EligibilityFact {
    use crate::domain::{CustomerId, EligibilityFact, OfferId, ProductType};
    use rust_decimal::Decimal;

    EligibilityFact {
        customer_id: CustomerId::new("C1"),
        offer_id: OfferId::new("O1"),
        product_type: ProductType::Preapproved,
        campaign_id: "CMP".to_string(),
        offer_amount: Decimal::new(200000, 0),
        tenure_months: 36,
        interest_rate: Decimal::new(1150, 2),
        age_years: Some(35),
        credit_score: Some(760),
        monthly_income: Some(Decimal::new(90000, 0)),
        existing_loan_count: Some(1),
        residence_type: Some("OWNED".to_string()),
        employment_type: Some("SALARIED".to_string()),
        is_customer360_profile_exists: true,
        is_top_up_offer: false,
    }
}
