//! Identity normalization.
//!
//! Every function here is pure and total: malformed input becomes `None`,
//! never an error. Applying normalization twice gives the same result as
//! applying it once.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{NormalizedIdentity, RawIdentity};

/// Indian mobile numbers have 10 significant digits.
const MOBILE_DIGITS: usize = 10;

const AADHAAR_DIGITS: usize = 12;

static PAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("valid PAN pattern"));

/// Canonicalize all identity fields of a raw record.
pub fn normalize(raw: &RawIdentity) -> NormalizedIdentity {
    NormalizedIdentity {
        mobile_number: raw.mobile_number.as_deref().and_then(normalize_mobile),
        pan_number: raw.pan_number.as_deref().and_then(normalize_pan),
        aadhaar_number: raw.aadhaar_number.as_deref().and_then(normalize_aadhaar),
        email_id: raw.email_id.as_deref().and_then(normalize_email),
        first_name: raw.first_name.as_deref().and_then(normalize_name),
        last_name: raw.last_name.as_deref().and_then(normalize_name),
        date_of_birth: raw.date_of_birth,
    }
}

/// Strip non-digits and keep the last 10; shorter results are discarded.
pub fn normalize_mobile(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MOBILE_DIGITS {
        return None;
    }
    Some(digits[digits.len() - MOBILE_DIGITS..].to_string())
}

/// Uppercase and trim; anything not shaped like `AAAAA9999A` is discarded.
pub fn normalize_pan(value: &str) -> Option<String> {
    let pan = value.trim().to_uppercase();
    if PAN_RE.is_match(&pan) {
        Some(pan)
    } else {
        None
    }
}

/// Strip non-digits; exactly 12 must remain.
pub fn normalize_aadhaar(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == AADHAAR_DIGITS {
        Some(digits)
    } else {
        None
    }
}

pub fn normalize_email(value: &str) -> Option<String> {
    let email = value.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

/// Trim and collapse internal whitespace, keeping the original casing.
pub fn normalize_name(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Title-case a single token for comparison (`rAVI` -> `Ravi`).
pub fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Comparison tokens of an identity's full name, title-cased.
pub fn name_tokens(identity: &NormalizedIdentity) -> Vec<String> {
    identity
        .full_name()
        .map(|name| name.split_whitespace().map(title_case).collect())
        .unwrap_or_default()
}
