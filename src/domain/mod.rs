pub mod customer;
pub mod evidence;
pub mod fact;
pub mod identity;
pub mod live_book;
pub mod match_decision;
pub mod offer;
pub mod outcome;
pub mod record;
pub mod rulebook;
pub mod verdict;

pub use customer::{CustomerId, CustomerProfile};
pub use evidence::{Evidence, RuleResult};
pub use fact::EligibilityFact;
pub use identity::{NormalizedIdentity, RawIdentity};
pub use live_book::{ActiveLoan, LiveBookRecord};
pub use match_decision::{Confidence, MatchDecision, MatchField, MatchSource};
pub use offer::{DedupReason, DedupStatus, Offer, OfferId, OfferStatus, ProductType};
pub use outcome::{OfferOutcome, ProcessOutcome};
pub use record::{CreditAttributes, IncomingOffer, IncomingRecord};
pub use rulebook::{RuleBook, RuleDef, RuleKind, RuleSetDef, ANY_CAMPAIGN};
pub use verdict::{EligibilityDecision, Verdict};
