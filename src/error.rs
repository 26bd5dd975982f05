use thiserror::Error;

use crate::store::journal::JournalError;
use crate::store::StoreError;

/// Malformed input that normalization could not coerce.
///
/// The record is skipped and reported; it is never silently dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has an empty record_id")]
    EmptyRecordId,

    #[error("record {record_id} has no usable identity fields")]
    NoIdentityFields { record_id: String },

    #[error("record {record_id} lists offer {offer_id} more than once")]
    DuplicateOfferId { record_id: String, offer_id: String },
}

/// Missing or inconsistent eligibility configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no rule set configured for product {product_type}, campaign {campaign_id}")]
    NoRuleSet {
        product_type: String,
        campaign_id: String,
    },

    #[error("rule {rule_id} requires a threshold")]
    MissingThreshold { rule_id: String },

    #[error("rule {rule_id} requires a non-empty list of values")]
    MissingValues { rule_id: String },

    #[error("rule {rule_id} cannot use APPROVE as its failure action")]
    ApproveOnFailure { rule_id: String },
}

/// Errors surfaced by the engine to its caller.
///
/// Duplicate detection and rule failures are outcomes, not errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("concurrent update conflict on customer {customer_id}")]
    ConcurrencyConflict { customer_id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl EngineError {
    /// True for errors a caller may retry with a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::from(ValidationError::NoIdentityFields {
            record_id: "R1".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "validation failed: record R1 has no usable identity fields"
        );
        assert!(!err.is_retryable());

        let conflict = EngineError::ConcurrencyConflict {
            customer_id: "C1".to_string(),
        };
        assert!(conflict.is_retryable());
    }
}
