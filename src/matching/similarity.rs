use std::collections::HashSet;

use crate::domain::NormalizedIdentity;
use crate::normalize::name_tokens;

/// Token-overlap ratio of two names: shared tokens over the larger token set.
///
/// Comparison is on title-cased tokens, so casing never matters. Returns 0.0
/// when either side has no name.
pub fn name_similarity(a: &NormalizedIdentity, b: &NormalizedIdentity) -> f64 {
    let left: HashSet<String> = name_tokens(a).into_iter().collect();
    let right: HashSet<String> = name_tokens(b).into_iter().collect();

    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    shared as f64 / left.len().max(right.len()) as f64
}
