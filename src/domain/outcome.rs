use serde::{Deserialize, Serialize};

use super::customer::CustomerId;
use super::match_decision::MatchDecision;
use super::offer::Offer;
use super::verdict::EligibilityDecision;

/// Final state of one offer after deduplication and eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferOutcome {
    pub offer: Offer,

    /// Absent for removed duplicates, which never reach eligibility
    #[serde(default)]
    pub eligibility: Option<EligibilityDecision>,

    /// The offer id was already committed; the stored state is reported as-is
    #[serde(default)]
    pub replayed: bool,
}

/// Everything the engine decided for one incoming record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub record_id: String,
    pub customer_id: CustomerId,
    pub match_decision: MatchDecision,

    /// A new customer profile was created for this record
    pub profile_created: bool,

    /// The profile was linked to a live-book record by this record
    #[serde(default)]
    pub linked_live_book: bool,

    /// Profiles found to be the same person and merged into `customer_id`
    #[serde(default)]
    pub merged_profiles: Vec<CustomerId>,

    pub offers: Vec<OfferOutcome>,

    /// Commit attempts, including the retry after a concurrency conflict
    pub attempts: u32,
}
