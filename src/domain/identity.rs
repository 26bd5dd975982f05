use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identity fields exactly as an upstream system captured them.
///
/// Nothing here is trusted: mobile numbers may carry country codes and
/// punctuation, PANs may be lowercase, names may have stray whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIdentity {
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
}

/// Canonical, comparable identity produced by the normalizer.
///
/// Every field is either a valid canonical value or `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedIdentity {
    pub mobile_number: Option<String>,
    pub pan_number: Option<String>,
    pub aadhaar_number: Option<String>,
    pub email_id: Option<String>,
    /// Trimmed and whitespace-collapsed; original casing preserved.
    pub first_name: Option<String>,
    /// Trimmed and whitespace-collapsed; original casing preserved.
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl NormalizedIdentity {
    /// True when none of the identifying fields survived normalization.
    ///
    /// Names and date of birth alone cannot identify a customer.
    pub fn is_empty(&self) -> bool {
        self.mobile_number.is_none()
            && self.pan_number.is_none()
            && self.aadhaar_number.is_none()
            && self.email_id.is_none()
    }

    /// Full name joined from first and last name, if either is present.
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }

    /// Every identifier present, prefixed by kind, for index lookups.
    pub fn identity_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(4);
        if let Some(pan) = &self.pan_number {
            keys.push(format!("pan:{}", pan));
        }
        if let Some(aadhaar) = &self.aadhaar_number {
            keys.push(format!("aadhaar:{}", aadhaar));
        }
        if let Some(mobile) = &self.mobile_number {
            keys.push(format!("mobile:{}", mobile));
        }
        if let Some(email) = &self.email_id {
            keys.push(format!("email:{}", email));
        }
        keys
    }
}

impl From<NormalizedIdentity> for RawIdentity {
    fn from(identity: NormalizedIdentity) -> Self {
        RawIdentity {
            mobile_number: identity.mobile_number,
            pan_number: identity.pan_number,
            aadhaar_number: identity.aadhaar_number,
            email_id: identity.email_id,
            first_name: identity.first_name,
            last_name: identity.last_name,
            date_of_birth: identity.date_of_birth,
        }
    }
}
