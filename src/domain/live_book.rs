use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::identity::NormalizedIdentity;
use super::offer::ProductType;

/// An active loan or granted eligibility held in the live book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLoan {
    /// Live-book reference for the loan or eligibility grant
    pub reference_id: String,
    pub product_type: ProductType,
}

/// A customer as recorded in the authoritative live book.
///
/// Identity fields are stored in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveBookRecord {
    pub live_book_id: String,

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

    #[serde(default)]
    pub active_loans: Vec<ActiveLoan>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl LiveBookRecord {
    /// The record's identity, for matching.
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

    /// The active loan of the given product type, if any.
    pub fn active_loan_for(&self, product_type: &ProductType) -> Option<&ActiveLoan> {
        self.active_loans
            .iter()
            .find(|loan| &loan.product_type == product_type)
    }
}
