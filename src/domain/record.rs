use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identity::RawIdentity;
use super::offer::{Offer, OfferId, ProductType};

/// Bureau and declared attributes that feed eligibility facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAttributes {
    #[serde(default)]
    pub credit_score: Option<u16>,

    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub monthly_income: Option<Decimal>,

    #[serde(default)]
    pub existing_loan_count: Option<u32>,

    #[serde(default)]
    pub residence_type: Option<String>,

    #[serde(default)]
    pub employment_type: Option<String>,
}

/// Offer payload as an upstream system sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingOffer {
    /// Upstream offer id; one is generated when absent
    #[serde(default)]
    pub offer_id: Option<String>,

    pub campaign_id: String,
    pub product_type: ProductType,

    #[serde(with = "rust_decimal::serde::str")]
    pub offer_amount: Decimal,
    pub tenure_months: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub interest_rate: Decimal,
}

/// Raw, unvalidated identity + offer payload from one upstream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingRecord {
    pub record_id: String,

    /// Upstream system (e.g. OFFER_MGMT, E_AGGREGATOR_FEED)
    pub source_system: String,

    #[serde(flatten)]
    pub identity: RawIdentity,

    #[serde(default)]
    pub credit: CreditAttributes,

    #[serde(default)]
    pub offers: Vec<IncomingOffer>,

    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl IncomingRecord {
    /// Materialize the record's offers as pending-dedup offers.
    pub fn to_offers(&self) -> Vec<Offer> {
        self.offers
            .iter()
            .map(|o| {
                let offer_id = match &o.offer_id {
                    Some(id) if !id.trim().is_empty() => OfferId::new(id.trim()),
                    _ => OfferId::generate(),
                };
                Offer::new(
                    offer_id,
                    o.campaign_id.trim(),
                    o.product_type.clone(),
                    self.source_system.clone(),
                    o.offer_amount,
                    o.tenure_months,
                    o.interest_rate,
                )
            })
            .collect()
    }
}
