//! Offer deduplication.
//!
//! Decides, once per offer, whether it is kept, excluded from dedup, or a
//! duplicate of an existing offer. Top-up offers form a closed partition:
//! they are compared only with other top-up offers, and nothing else is
//! ever compared with them.

use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

use crate::domain::{
    CustomerId, DedupReason, DedupStatus, LiveBookRecord, Offer, OfferId, ProductType,
};

/// Default relative amount tolerance (1%).
pub const DEFAULT_AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Deduplicator tuning.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Maximum relative amount difference (fraction of the existing amount)
    pub amount_tolerance: Decimal,

    /// Product types that bypass deduplication entirely
    pub excluded_products: HashSet<ProductType>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        DedupConfig {
            amount_tolerance: DEFAULT_AMOUNT_TOLERANCE,
            excluded_products: HashSet::new(),
        }
    }
}

/// One-pass, one-direction offer deduplicator.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Deduplicator { config }
    }

    /// Decide the fate of one incoming offer.
    ///
    /// An offer that already carries a decision is returned unchanged, so a
    /// removed duplicate is never reinstated here.
    pub fn deduplicate(
        &self,
        customer_id: &CustomerId,
        mut incoming: Offer,
        existing: &[Offer],
        live_book: Option<&LiveBookRecord>,
    ) -> Offer {
        if incoming.deduplication_status.is_decided() {
            return incoming;
        }

        incoming.customer_id = Some(customer_id.clone());

        // Exclusion skips comparison with internal offers only; the live book still applies
        let excluded = self.config.excluded_products.contains(&incoming.product_type);

        let original = if excluded {
            None
        } else {
            self.find_original(customer_id, &incoming, existing)
        };
        if let Some(original) = original {
            debug!(
                offer_id = %incoming.offer_id,
                original_offer_id = %original.offer_id,
                campaign_id = %incoming.campaign_id,
                "Offer duplicates existing offer"
            );
            let original_id = original.offer_id.clone();
            incoming.mark_duplicate(original_id, DedupReason::DuplicateOfExistingOffer);
            return incoming;
        }

        if let Some(loan) = live_book.and_then(|lb| lb.active_loan_for(&incoming.product_type)) {
            debug!(
                offer_id = %incoming.offer_id,
                reference_id = %loan.reference_id,
                product_type = %incoming.product_type,
                "Offer duplicates live book loan"
            );
            incoming.mark_duplicate(
                OfferId::new(loan.reference_id.clone()),
                DedupReason::MatchedLiveBookCustomer,
            );
            return incoming;
        }

        if excluded {
            incoming.mark_retained(
                DedupStatus::NotApplicable,
                DedupReason::ProductExcludedFromDedup,
            );
        } else {
            incoming.mark_retained(DedupStatus::Kept, DedupReason::FirstOfferOfKind);
        }
        incoming
    }

    /// Deduplicate a batch of offers for one customer.
    ///
    /// Offers kept earlier in the batch become comparison candidates for
    /// later ones.
    pub fn deduplicate_all(
        &self,
        customer_id: &CustomerId,
        incoming: Vec<Offer>,
        existing: &[Offer],
        live_book: Option<&LiveBookRecord>,
    ) -> Vec<Offer> {
        let mut pool: Vec<Offer> = existing.to_vec();
        let mut decided = Vec::with_capacity(incoming.len());

        for offer in incoming {
            let offer = self.deduplicate(customer_id, offer, &pool, live_book);
            if offer.is_dedup_anchor() {
                pool.push(offer.clone());
            }
            decided.push(offer);
        }

        decided
    }

    /// The existing offer `incoming` duplicates, if any.
    ///
    /// When several qualify, the oldest one is the original.
    fn find_original<'a>(
        &self,
        customer_id: &CustomerId,
        incoming: &Offer,
        existing: &'a [Offer],
    ) -> Option<&'a Offer> {
        existing
            .iter()
            .filter(|e| in_comparison_set(customer_id, incoming, e))
            .filter(|e| self.is_same_offer(incoming, e))
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.offer_id.cmp(&b.offer_id))
            })
    }

    /// Same campaign, same tenure, amount within tolerance.
    fn is_same_offer(&self, incoming: &Offer, existing: &Offer) -> bool {
        incoming.campaign_id == existing.campaign_id
            && incoming.tenure_months == existing.tenure_months
            && within_tolerance(
                incoming.offer_amount,
                existing.offer_amount,
                self.config.amount_tolerance,
            )
    }
}

/// Partition filter: same customer, a different offer that can anchor
/// duplicates, and on the same side of the top-up boundary.
fn in_comparison_set(customer_id: &CustomerId, incoming: &Offer, existing: &Offer) -> bool {
    existing.customer_id.as_ref() == Some(customer_id)
        && existing.offer_id != incoming.offer_id
        && existing.is_dedup_anchor()
        && existing.product_type.is_top_up() == incoming.product_type.is_top_up()
}

/// True if `amount` differs from `base` by less than `tolerance * base`.
fn within_tolerance(amount: Decimal, base: Decimal, tolerance: Decimal) -> bool {
    let diff = (amount - base).abs();
    diff.is_zero() || diff < tolerance * base.abs()
}
