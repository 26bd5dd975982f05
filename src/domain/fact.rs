use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::customer::{CustomerId, CustomerProfile};
use super::offer::{Offer, OfferId, ProductType};
use super::record::CreditAttributes;

/// Read-only composition of one customer and one offer for rule evaluation.
///
/// Built fresh for every evaluation and owned outright, so no two
/// evaluations ever observe each other's fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityFact {
    pub customer_id: CustomerId,
    pub offer_id: OfferId,
    pub product_type: ProductType,
    pub campaign_id: String,

    pub offer_amount: Decimal,
    pub tenure_months: u32,
    pub interest_rate: Decimal,

    pub age_years: Option<u32>,
    pub credit_score: Option<u16>,
    pub monthly_income: Option<Decimal>,
    pub existing_loan_count: Option<u32>,
    pub residence_type: Option<String>,
    pub employment_type: Option<String>,

    /// The customer already had a CDP or live-book profile before this record
    pub is_customer360_profile_exists: bool,
    pub is_top_up_offer: bool,
}

impl EligibilityFact {
    /// Compose a fact from its parts.
    pub fn compose(
        profile: &CustomerProfile,
        offer: &Offer,
        credit: &CreditAttributes,
        profile_existed: bool,
        as_of: NaiveDate,
    ) -> Self {
        EligibilityFact {
            customer_id: profile.customer_id.clone(),
            offer_id: offer.offer_id.clone(),
            product_type: offer.product_type.clone(),
            campaign_id: offer.campaign_id.clone(),
            offer_amount: offer.offer_amount,
            tenure_months: offer.tenure_months,
            interest_rate: offer.interest_rate,
            age_years: profile.age_on(as_of),
            credit_score: credit.credit_score,
            monthly_income: credit.monthly_income,
            existing_loan_count: credit.existing_loan_count,
            residence_type: credit.residence_type.as_ref().map(|s| s.trim().to_uppercase()),
            employment_type: credit.employment_type.as_ref().map(|s| s.trim().to_uppercase()),
            is_customer360_profile_exists: profile_existed || profile.live_book_id.is_some(),
            is_top_up_offer: offer.product_type.is_top_up(),
        }
    }
}
