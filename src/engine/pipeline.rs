use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::dedup::{DedupConfig, Deduplicator};
use crate::domain::{
    CustomerId, CustomerProfile, EligibilityFact, IncomingRecord, LiveBookRecord, MatchDecision,
    MatchSource, NormalizedIdentity, Offer, OfferOutcome, OfferStatus, ProcessOutcome, Verdict,
};
use crate::error::{EngineError, ValidationError};
use crate::matching::{CandidatePool, MatchConfig, MatchResolver};
use crate::normalize::normalize;
use crate::observability::{EngineMetrics, TimingGuard};
use crate::rules::RuleEvaluator;
use crate::store::{
    Commit, CustomerStore, JournalEntry, JournalWriter, LiveBook, ProfileWrite,
};

use super::locks::LockPool;

/// Commit attempts per record: the first try plus one retry on conflict.
const MAX_ATTEMPTS: u32 = 2;

/// The match, dedup and eligibility pipeline for incoming records.
///
/// Records sharing any identity key are serialized through the lock pool;
/// everything else runs in parallel. Each attempt reads a fresh
/// snapshot and commits optimistically, so a race that slips past the lock
/// surfaces as a conflict and is retried once.
pub struct Engine {
    store: Arc<dyn CustomerStore>,
    live_book: Arc<dyn LiveBook>,
    resolver: MatchResolver,
    deduplicator: Deduplicator,
    evaluator: Arc<RuleEvaluator>,
    locks: LockPool,
    journal: Option<Mutex<JournalWriter>>,
    metrics: Arc<EngineMetrics>,
}

/// Profile state decided for one attempt.
struct ResolvedProfile {
    profile: CustomerProfile,
    expected_version: Option<u64>,
    existed: bool,
    linked: bool,
    merged: Vec<CustomerProfile>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        live_book: Arc<dyn LiveBook>,
        evaluator: Arc<RuleEvaluator>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Engine {
            store,
            live_book,
            resolver: MatchResolver::default(),
            deduplicator: Deduplicator::default(),
            evaluator,
            locks: LockPool::new(),
            journal: None,
            metrics,
        }
    }

    pub fn with_match_config(mut self, config: MatchConfig) -> Self {
        self.resolver = MatchResolver::new(config);
        self
    }

    pub fn with_dedup_config(mut self, config: DedupConfig) -> Self {
        self.deduplicator = Deduplicator::new(config);
        self
    }

    /// Append an audit entry for every record processed or refused.
    pub fn with_journal(mut self, journal: JournalWriter) -> Self {
        self.journal = Some(Mutex::new(journal));
        self
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn locks(&self) -> &LockPool {
        &self.locks
    }

    /// Match, deduplicate and evaluate one record, committing the result.
    pub fn process(&self, record: &IncomingRecord) -> Result<ProcessOutcome, EngineError> {
        let _timer = TimingGuard::new(&self.metrics);
        self.metrics.record_received();

        let identity = match validate(record) {
            Ok(identity) => identity,
            Err(e) => {
                self.metrics.record_validation_error();
                warn!(record_id = %record.record_id, error = %e, "Record refused");
                self.journal(&JournalEntry::refused(&record.record_id, &e));
                return Err(e.into());
            }
        };

        // Two records can only reach the same customer through a shared key,
        // so holding every key serializes them.
        let keys = identity.identity_keys();
        if keys.is_empty() {
            return Err(ValidationError::NoIdentityFields {
                record_id: record.record_id.clone(),
            }
            .into());
        }
        let locks = self.locks.locks_for(&keys);
        let mut held: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();
        for state in held.iter_mut() {
            state.touch();
        }

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            match self.attempt(record, &identity, attempts) {
                Ok(outcome) => break outcome,
                Err(EngineError::Store(e)) if e.is_conflict() => {
                    let customer_id = e.customer_id().unwrap_or_default().to_string();
                    if attempts < MAX_ATTEMPTS {
                        self.metrics.record_conflict(true);
                        warn!(
                            record_id = %record.record_id,
                            customer_id = %customer_id,
                            error = %e,
                            "Commit conflict, retrying with a fresh snapshot"
                        );
                        continue;
                    }
                    self.metrics.record_conflict(false);
                    warn!(
                        record_id = %record.record_id,
                        customer_id = %customer_id,
                        error = %e,
                        "Commit conflict after retry"
                    );
                    self.journal(&JournalEntry::refused(&record.record_id, &e));
                    return Err(EngineError::ConcurrencyConflict { customer_id });
                }
                Err(e) => return Err(e),
            }
        };
        drop(held);

        self.record_metrics(&outcome);
        self.journal(&JournalEntry::decision(outcome.clone()));

        debug!(
            record_id = %outcome.record_id,
            customer_id = %outcome.customer_id,
            confidence = %outcome.match_decision.confidence,
            offers = outcome.offers.len(),
            attempts = outcome.attempts,
            "Record processed"
        );

        Ok(outcome)
    }

    /// Record the rule book version put into force.
    pub fn note_rule_book(&self, version: &str) {
        self.journal(&JournalEntry::rule_book(version));
    }

    /// Flush and sync the audit journal, if one is attached.
    pub fn flush_journal(&self) -> Result<(), EngineError> {
        if let Some(journal) = &self.journal {
            journal.lock().sync()?;
        }
        Ok(())
    }

    /// One snapshot-resolve-commit pass.
    fn attempt(
        &self,
        record: &IncomingRecord,
        identity: &NormalizedIdentity,
        attempt: u32,
    ) -> Result<ProcessOutcome, EngineError> {
        let live_candidates = self.live_book.candidates(identity);
        let internal_candidates = self.internal_candidates(identity, &live_candidates);

        let pool = CandidatePool::new(&live_candidates, &internal_candidates);
        let decision = self.resolver.resolve(identity, &pool);

        let live_record = decision
            .live_book_id
            .as_deref()
            .and_then(|id| live_candidates.iter().find(|r| r.live_book_id == id));

        let resolved = self.resolve_profile(identity, &decision, live_record, &internal_candidates);
        let customer_id = resolved.profile.customer_id.clone();

        let mut fresh = Vec::new();
        let mut slots: Vec<Option<OfferOutcome>> = Vec::new();
        for offer in record.to_offers() {
            match self.store.offer(&offer.offer_id) {
                Some(stored) => {
                    debug!(offer_id = %stored.offer_id, "Offer already committed");
                    slots.push(Some(OfferOutcome {
                        offer: stored,
                        eligibility: None,
                        replayed: true,
                    }));
                }
                None => {
                    fresh.push(offer);
                    slots.push(None);
                }
            }
        }

        let existing = if resolved.existed {
            self.store.offers_for_customer(&customer_id)
        } else {
            Vec::new()
        };
        let decided = self
            .deduplicator
            .deduplicate_all(&customer_id, fresh, &existing, live_record);

        let as_of = record.received_at.date_naive();
        let mut evaluated = Vec::with_capacity(decided.len());
        for mut offer in decided {
            let eligibility = if offer.deduplication_status.proceeds_to_eligibility() {
                let fact = EligibilityFact::compose(
                    &resolved.profile,
                    &offer,
                    &record.credit,
                    resolved.existed,
                    as_of,
                );
                let decision = self.evaluator.evaluate(&fact);
                apply_verdict(&mut offer, decision.verdict, &decision.reasons);
                Some(decision)
            } else {
                None
            };
            evaluated.push(OfferOutcome {
                offer,
                eligibility,
                replayed: false,
            });
        }

        let mut evaluated = evaluated.into_iter();
        let outcomes: Vec<OfferOutcome> = slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| evaluated.next()))
            .collect();

        let mut profile = resolved.profile;
        profile.updated_at = Utc::now();
        let mut writes = vec![match resolved.expected_version {
            Some(version) => ProfileWrite::update(profile, version),
            None => ProfileWrite::create(profile),
        }];
        let merged_profiles: Vec<CustomerId> = resolved
            .merged
            .iter()
            .map(|p| p.customer_id.clone())
            .collect();
        for merged in resolved.merged {
            let version = merged.version;
            writes.push(ProfileWrite::update(merged, version));
        }

        let offers: Vec<Offer> = outcomes
            .iter()
            .filter(|o| !o.replayed)
            .map(|o| o.offer.clone())
            .collect();

        self.store.commit(Commit {
            profiles: writes,
            offers,
        })?;

        if resolved.linked {
            debug!(
                customer_id = %customer_id,
                live_book_id = ?decision.live_book_id,
                "Profile linked to live book"
            );
        }
        Ok(ProcessOutcome {
            record_id: record.record_id.clone(),
            customer_id,
            match_decision: decision,
            profile_created: resolved.expected_version.is_none(),
            linked_live_book: resolved.linked,
            merged_profiles,
            offers: outcomes,
            attempts: attempt,
        })
    }

    /// Active profiles sharing an identifier, plus those already linked to a
    /// candidate live-book record.
    fn internal_candidates(
        &self,
        identity: &NormalizedIdentity,
        live_candidates: &[LiveBookRecord],
    ) -> Vec<CustomerProfile> {
        let mut candidates = self.store.candidates(identity);
        for record in live_candidates {
            for profile in self.store.linked_to(&record.live_book_id) {
                if !candidates.iter().any(|c| c.customer_id == profile.customer_id) {
                    candidates.push(profile);
                }
            }
        }
        candidates
    }

    /// Pick, create or update the profile the record belongs to.
    fn resolve_profile(
        &self,
        identity: &NormalizedIdentity,
        decision: &MatchDecision,
        live_record: Option<&LiveBookRecord>,
        candidates: &[CustomerProfile],
    ) -> ResolvedProfile {
        let matched = decision
            .matched_profile_id
            .as_ref()
            .and_then(|id| candidates.iter().find(|p| &p.customer_id == id));

        let (mut profile, expected_version) = match matched {
            Some(existing) => {
                let mut profile = existing.clone();
                profile.merge_identity(identity);
                (profile, Some(existing.version))
            }
            None => (
                CustomerProfile::from_identity(CustomerId::generate(), identity),
                None,
            ),
        };

        let linked = live_record
            .map(|r| profile.link_live_book(&r.live_book_id))
            .unwrap_or(false);

        let (conflicting, same_person): (Vec<&CustomerProfile>, Vec<&CustomerProfile>) = candidates
            .iter()
            .filter(|c| c.customer_id != profile.customer_id && c.is_active())
            .filter(|c| {
                shares(&c.pan_number, &profile.pan_number)
                    || shares(&c.aadhaar_number, &profile.aadhaar_number)
            })
            .partition(|c| {
                conflicts(&c.pan_number, &profile.pan_number)
                    || conflicts(&c.aadhaar_number, &profile.aadhaar_number)
            });

        // A profile sharing one hard key but holding a different other one is
        // someone else; the survivor does not take the shared key from it.
        for other in conflicting {
            warn!(
                customer_id = %profile.customer_id,
                conflicting_profile = %other.customer_id,
                "Profiles share an identifier but conflict on another, not merging"
            );
            if shares(&other.pan_number, &profile.pan_number)
                && matched.map_or(true, |m| m.pan_number != profile.pan_number)
            {
                profile.pan_number = None;
            }
            if shares(&other.aadhaar_number, &profile.aadhaar_number)
                && matched.map_or(true, |m| m.aadhaar_number != profile.aadhaar_number)
            {
                profile.aadhaar_number = None;
            }
        }

        // Remaining active profiles holding the survivor's PAN or Aadhaar are the same person
        let merged: Vec<CustomerProfile> = same_person
            .into_iter()
            .map(|c| {
                let mut merged = c.clone();
                merged.mark_merged_into(&profile.customer_id);
                merged.updated_at = Utc::now();
                merged
            })
            .collect();

        for other in &merged {
            debug!(
                customer_id = %profile.customer_id,
                merged_profile = %other.customer_id,
                "Merging duplicate profile"
            );
        }

        ResolvedProfile {
            existed: matched.is_some() || decision.source == MatchSource::LiveBook,
            profile,
            expected_version,
            linked,
            merged,
        }
    }

    fn record_metrics(&self, outcome: &ProcessOutcome) {
        let decision = &outcome.match_decision;
        self.metrics
            .record_match(decision.confidence, decision.source == MatchSource::LiveBook);
        self.metrics.record_profile(
            outcome.profile_created,
            outcome.linked_live_book,
            outcome.merged_profiles.len(),
        );

        for offer in &outcome.offers {
            if offer.replayed {
                self.metrics.record_replay();
                continue;
            }
            self.metrics.record_dedup(offer.offer.deduplication_status);
            if let Some(eligibility) = &offer.eligibility {
                self.metrics.record_verdict(eligibility.verdict);
            }
        }
    }

    fn journal(&self, entry: &JournalEntry) {
        let Some(journal) = &self.journal else {
            return;
        };
        match journal.lock().append(entry) {
            Ok(()) => self.metrics.record_journal_write(true),
            Err(e) => {
                self.metrics.record_journal_write(false);
                error!(error = %e, "Failed to append journal entry");
            }
        }
    }
}

/// Normalize a record's identity and reject what cannot be processed.
pub fn validate(record: &IncomingRecord) -> Result<NormalizedIdentity, ValidationError> {
    if record.record_id.trim().is_empty() {
        return Err(ValidationError::EmptyRecordId);
    }

    let identity = normalize(&record.identity);
    if identity.is_empty() {
        return Err(ValidationError::NoIdentityFields {
            record_id: record.record_id.clone(),
        });
    }

    let mut seen = HashSet::new();
    for offer in &record.offers {
        if let Some(id) = offer.offer_id.as_deref().map(str::trim) {
            if !id.is_empty() && !seen.insert(id) {
                return Err(ValidationError::DuplicateOfferId {
                    record_id: record.record_id.clone(),
                    offer_id: id.to_string(),
                });
            }
        }
    }

    Ok(identity)
}

/// Move an evaluated offer to the status its verdict implies.
fn apply_verdict(offer: &mut Offer, verdict: Verdict, reasons: &[String]) {
    offer.offer_status = match verdict {
        Verdict::Approve => OfferStatus::Active,
        Verdict::Review => OfferStatus::Pending,
        Verdict::Reject => OfferStatus::Rejected,
    };
    offer.eligibility_reasons = reasons.to_vec();
    offer.updated_at = Utc::now();
}

fn shares(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn conflicts(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}
