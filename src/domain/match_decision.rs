use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::customer::CustomerId;

/// Strength of an identity match, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    None,
    High,
    Exact,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::None => "NONE",
            Confidence::High => "HIGH",
            Confidence::Exact => "EXACT",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An identity field that agreed between record and candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Pan,
    Aadhaar,
    Mobile,
    Email,
    Name,
}

/// Which candidate pool produced the winning match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    LiveBook,
    Internal,
    Unmatched,
}

/// Output of the match resolver.
///
/// `matched_profile_id` names the CDP profile to update, if one exists.
/// When the live book won, `live_book_id` is set and the CDP profile (if
/// any) is the one to link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub matched_profile_id: Option<CustomerId>,

    #[serde(default)]
    pub live_book_id: Option<String>,

    pub confidence: Confidence,

    /// Fields that agreed with the winning candidate
    #[serde(default)]
    pub matched_fields: SmallVec<[MatchField; 4]>,

    pub source: MatchSource,
}

impl MatchDecision {
    /// No candidate matched.
    pub fn none() -> Self {
        MatchDecision {
            matched_profile_id: None,
            live_book_id: None,
            confidence: Confidence::None,
            matched_fields: SmallVec::new(),
            source: MatchSource::Unmatched,
        }
    }

    /// True if some candidate (live book or internal) matched.
    pub fn is_match(&self) -> bool {
        self.confidence != Confidence::None
    }
}
