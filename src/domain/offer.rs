use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::customer::CustomerId;

/// Unique offer identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub String);

impl OfferId {
    pub fn new(id: impl Into<String>) -> Self {
        OfferId(id.into())
    }

    pub fn generate() -> Self {
        OfferId(format!("OFR-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loan product type.
///
/// Unknown product codes are carried through as `Other` so new products
/// can be configured without a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductType {
    Loyalty,
    Preapproved,
    EAggregator,
    TopUp,
    Other(String),
}

impl ProductType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LOYALTY" => ProductType::Loyalty,
            "PREAPPROVED" => ProductType::Preapproved,
            "E_AGGREGATOR" => ProductType::EAggregator,
            "TOP_UP" => ProductType::TopUp,
            other => ProductType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProductType::Loyalty => "LOYALTY",
            ProductType::Preapproved => "PREAPPROVED",
            ProductType::EAggregator => "E_AGGREGATOR",
            ProductType::TopUp => "TOP_UP",
            ProductType::Other(code) => code,
        }
    }

    #[inline]
    pub fn is_top_up(&self) -> bool {
        *self == ProductType::TopUp
    }
}

impl From<String> for ProductType {
    fn from(s: String) -> Self {
        ProductType::parse(&s)
    }
}

impl From<ProductType> for String {
    fn from(p: ProductType) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business lifecycle of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Active,
    Finalized,
    Expired,
    Rejected,
}

impl OfferStatus {
    /// Offers that still represent a live proposition to the customer.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            OfferStatus::Pending | OfferStatus::Active | OfferStatus::Finalized
        )
    }
}

/// Outcome of deduplication for one offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupStatus {
    PendingDedup,
    Kept,
    RemovedDuplicate,
    NotApplicable,
}

impl DedupStatus {
    /// True once the deduplicator has decided.
    pub fn is_decided(&self) -> bool {
        *self != DedupStatus::PendingDedup
    }

    /// Only kept or not-applicable offers proceed to eligibility.
    pub fn proceeds_to_eligibility(&self) -> bool {
        matches!(self, DedupStatus::Kept | DedupStatus::NotApplicable)
    }
}

/// Reason code recorded with a deduplication decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupReason {
    DuplicateOfExistingOffer,
    MatchedLiveBookCustomer,
    FirstOfferOfKind,
    ProductExcludedFromDedup,
}

impl DedupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupReason::DuplicateOfExistingOffer => "DUPLICATE_OF_EXISTING_OFFER",
            DedupReason::MatchedLiveBookCustomer => "MATCHED_LIVE_BOOK_CUSTOMER",
            DedupReason::FirstOfferOfKind => "FIRST_OFFER_OF_KIND",
            DedupReason::ProductExcludedFromDedup => "PRODUCT_EXCLUDED_FROM_DEDUP",
        }
    }
}

impl fmt::Display for DedupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One proposed or existing loan offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: OfferId,

    /// Owner; unset until the customer has been resolved
    #[serde(default)]
    pub customer_id: Option<CustomerId>,

    pub campaign_id: String,
    pub product_type: ProductType,
    pub source_system: String,

    #[serde(with = "rust_decimal::serde::str")]
    pub offer_amount: Decimal,
    pub tenure_months: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub interest_rate: Decimal,

    pub offer_status: OfferStatus,
    pub deduplication_status: DedupStatus,
    #[serde(default)]
    pub deduplication_reason: Option<DedupReason>,
    /// Offer (or live-book loan reference) this one duplicated
    #[serde(default)]
    pub original_offer_id: Option<OfferId>,

    /// Reason codes from the most recent eligibility evaluation
    #[serde(default)]
    pub eligibility_reasons: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Create a freshly ingested offer awaiting deduplication.
    pub fn new(
        offer_id: OfferId,
        campaign_id: impl Into<String>,
        product_type: ProductType,
        source_system: impl Into<String>,
        offer_amount: Decimal,
        tenure_months: u32,
        interest_rate: Decimal,
    ) -> Self {
        let now = Utc::now();
        Offer {
            offer_id,
            customer_id: None,
            campaign_id: campaign_id.into(),
            product_type,
            source_system: source_system.into(),
            offer_amount,
            tenure_months,
            interest_rate,
            offer_status: OfferStatus::Pending,
            deduplication_status: DedupStatus::PendingDedup,
            deduplication_reason: None,
            original_offer_id: None,
            eligibility_reasons: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as a duplicate of `original`.
    ///
    /// Always sets `original_offer_id`, so a removed duplicate can be traced.
    pub fn mark_duplicate(&mut self, original: OfferId, reason: DedupReason) {
        self.deduplication_status = DedupStatus::RemovedDuplicate;
        self.deduplication_reason = Some(reason);
        self.original_offer_id = Some(original);
        self.updated_at = Utc::now();
    }

    /// Mark as kept or not-applicable.
    pub fn mark_retained(&mut self, status: DedupStatus, reason: DedupReason) {
        self.deduplication_status = status;
        self.deduplication_reason = Some(reason);
        self.original_offer_id = None;
        self.updated_at = Utc::now();
    }

    /// True if this offer can serve as the original for later duplicates.
    pub fn is_dedup_anchor(&self) -> bool {
        self.deduplication_status.proceeds_to_eligibility() && self.offer_status.is_live()
    }
}
