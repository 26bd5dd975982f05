pub mod config;
pub mod dedup;
pub mod domain;
pub mod engine;
pub mod error;
pub mod matching;
pub mod normalize;
pub mod observability;
pub mod rulebook;
pub mod rules;
pub mod store;

pub use config::Config;
pub use dedup::{DedupConfig, Deduplicator};
pub use domain::{
    CustomerProfile, IncomingRecord, MatchDecision, NormalizedIdentity, Offer, ProcessOutcome,
    RawIdentity,
};
pub use engine::{run_batch, Engine};
pub use error::{ConfigurationError, EngineError, ValidationError};
pub use matching::{MatchConfig, MatchResolver};
pub use normalize::normalize;
pub use rules::{RuleEvaluator, RuleRegistry};
