use thiserror::Error;

use crate::domain::{CustomerId, CustomerProfile, LiveBookRecord, NormalizedIdentity, Offer, OfferId};

/// Errors raised by store implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("profile {customer_id} changed since it was read (expected version {expected:?}, found {found:?})")]
    ConcurrencyConflict {
        customer_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("{field} is already held by active profile {customer_id}")]
    UniqueIdentityViolation {
        field: &'static str,
        customer_id: String,
    },

    #[error("offer {offer_id} references unknown customer {customer_id}")]
    UnknownCustomer { offer_id: String, customer_id: String },

    #[error("offer {0} has no customer")]
    UnownedOffer(String),
}

impl StoreError {
    /// Conflicts that a fresh snapshot may resolve.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::UniqueIdentityViolation { .. }
        )
    }

    /// The customer the error is about, if any.
    pub fn customer_id(&self) -> Option<&str> {
        match self {
            StoreError::ConcurrencyConflict { customer_id, .. }
            | StoreError::UniqueIdentityViolation { customer_id, .. }
            | StoreError::UnknownCustomer { customer_id, .. } => Some(customer_id),
            StoreError::UnownedOffer(_) => None,
        }
    }
}

/// Read-only view of the authoritative live book.
pub trait LiveBook: Send + Sync {
    /// Records sharing at least one identifier with `identity`.
    fn candidates(&self, identity: &NormalizedIdentity) -> Vec<LiveBookRecord>;

    fn get(&self, live_book_id: &str) -> Option<LiveBookRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A profile to write, with the version it was read at.
///
/// `expected_version` is `None` for a profile that must not exist yet.
#[derive(Debug, Clone)]
pub struct ProfileWrite {
    pub profile: CustomerProfile,
    pub expected_version: Option<u64>,
}

impl ProfileWrite {
    pub fn create(profile: CustomerProfile) -> Self {
        ProfileWrite {
            profile,
            expected_version: None,
        }
    }

    pub fn update(profile: CustomerProfile, expected_version: u64) -> Self {
        ProfileWrite {
            profile,
            expected_version: Some(expected_version),
        }
    }
}

/// Everything one record changes, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    pub profiles: Vec<ProfileWrite>,
    pub offers: Vec<Offer>,
}

/// Customer profiles and offers owned by the engine.
pub trait CustomerStore: Send + Sync {
    /// Active profiles sharing at least one identifier with `identity`.
    fn candidates(&self, identity: &NormalizedIdentity) -> Vec<CustomerProfile>;

    /// Active profiles linked to a live-book record.
    fn linked_to(&self, live_book_id: &str) -> Vec<CustomerProfile>;

    fn profile(&self, customer_id: &CustomerId) -> Option<CustomerProfile>;

    fn offers_for_customer(&self, customer_id: &CustomerId) -> Vec<Offer>;

    fn offer(&self, offer_id: &OfferId) -> Option<Offer>;

    /// Apply a commit atomically.
    ///
    /// Fails without side effects when a profile version moved or a PAN or
    /// Aadhaar would be held by two active profiles. Written profiles get
    /// their version advanced by one.
    fn commit(&self, commit: Commit) -> Result<(), StoreError>;
}
