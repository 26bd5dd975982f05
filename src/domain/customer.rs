use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::identity::NormalizedIdentity;

/// System-generated, stable customer identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        CustomerId(id.into())
    }

    /// Allocate a fresh identifier.
    pub fn generate() -> Self {
        CustomerId(format!("CUST-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical, deduplicated representation of one human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: CustomerId,

    /// Link to the authoritative live-book record once matched
    #[serde(default)]
    pub live_book_id: Option<String>,

    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub pan_number: Option<String>,
    #[serde(default)]
    pub aadhaar_number: Option<String>,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,

    /// Set when this profile turned out to be the same person as another
    #[serde(default)]
    pub merged_into: Option<CustomerId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Incremented on every committed change; used for optimistic commits
    #[serde(default)]
    pub version: u64,
}

impl CustomerProfile {
    /// Create a new profile from a normalized identity.
    pub fn from_identity(customer_id: CustomerId, identity: &NormalizedIdentity) -> Self {
        let now = Utc::now();
        CustomerProfile {
            customer_id,
            live_book_id: None,
            mobile_number: identity.mobile_number.clone(),
            pan_number: identity.pan_number.clone(),
            aadhaar_number: identity.aadhaar_number.clone(),
            email_id: identity.email_id.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            date_of_birth: identity.date_of_birth,
            merged_into: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Merge incoming identity attributes without destroying existing ones.
    ///
    /// PAN and Aadhaar are keys and only fill gaps. Contact details take
    /// the newest non-empty value. Names and date of birth only fill gaps.
    /// Returns true if anything changed.
    pub fn merge_identity(&mut self, identity: &NormalizedIdentity) -> bool {
        let mut changed = false;

        changed |= fill_gap(&mut self.pan_number, &identity.pan_number);
        changed |= fill_gap(&mut self.aadhaar_number, &identity.aadhaar_number);
        changed |= take_newer(&mut self.mobile_number, &identity.mobile_number);
        changed |= take_newer(&mut self.email_id, &identity.email_id);
        changed |= fill_gap(&mut self.first_name, &identity.first_name);
        changed |= fill_gap(&mut self.last_name, &identity.last_name);

        if self.date_of_birth.is_none() && identity.date_of_birth.is_some() {
            self.date_of_birth = identity.date_of_birth;
            changed = true;
        }

        changed
    }

    /// Link this profile to a live-book record.
    pub fn link_live_book(&mut self, live_book_id: &str) -> bool {
        if self.live_book_id.as_deref() == Some(live_book_id) {
            return false;
        }
        self.live_book_id = Some(live_book_id.to_string());
        true
    }

    /// Mark this profile as merged into another one.
    pub fn mark_merged_into(&mut self, survivor: &CustomerId) {
        self.merged_into = Some(survivor.clone());
    }

    /// True if the profile still participates in matching.
    pub fn is_active(&self) -> bool {
        self.merged_into.is_none()
    }

    /// The profile's identity, for matching.
    pub fn identity(&self) -> NormalizedIdentity {
        NormalizedIdentity {
            mobile_number: self.mobile_number.clone(),
            pan_number: self.pan_number.clone(),
            aadhaar_number: self.aadhaar_number.clone(),
            email_id: self.email_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth,
        }
    }

    /// Age in whole years on the given date.
    pub fn age_on(&self, as_of: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| as_of.years_since(dob))
    }
}

fn fill_gap(current: &mut Option<String>, incoming: &Option<String>) -> bool {
    match (current.as_ref(), incoming) {
        (None, Some(value)) if !value.is_empty() => {
            *current = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn take_newer(current: &mut Option<String>, incoming: &Option<String>) -> bool {
    match incoming {
        Some(value) if !value.is_empty() && current.as_ref() != Some(value) => {
            *current = Some(value.clone());
            true
        }
        _ => false,
    }
}
