use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::{Confidence, DedupStatus, Verdict};

/// Engine counters, exported in Prometheus text format.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Records accepted for processing
    pub records_total: AtomicU64,

    /// Records refused by validation
    pub validation_errors: AtomicU64,

    /// Match decisions by confidence
    pub match_exact: AtomicU64,
    pub match_high: AtomicU64,
    pub match_none: AtomicU64,
    pub match_live_book: AtomicU64,

    /// Profile lifecycle
    pub profiles_created: AtomicU64,
    pub profiles_linked: AtomicU64,
    pub profiles_merged: AtomicU64,

    /// Deduplication outcomes
    pub dedup_kept: AtomicU64,
    pub dedup_removed: AtomicU64,
    pub dedup_not_applicable: AtomicU64,
    pub offers_replayed: AtomicU64,

    /// Eligibility verdicts
    pub eligibility_approve: AtomicU64,
    pub eligibility_review: AtomicU64,
    pub eligibility_reject: AtomicU64,

    /// Optimistic commit conflicts
    pub conflicts_retried: AtomicU64,
    pub conflicts_surfaced: AtomicU64,

    /// Record latency buckets
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_over_50ms: AtomicU64,

    /// Audit journal
    pub journal_writes_total: AtomicU64,
    pub journal_write_errors: AtomicU64,

    /// Rule book reloads
    pub rule_book_reloads_total: AtomicU64,
    pub rule_book_reload_errors: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        EngineMetrics::default()
    }

    pub fn record_received(&self) {
        self.records_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self, confidence: Confidence, live_book: bool) {
        let counter = match confidence {
            Confidence::Exact => &self.match_exact,
            Confidence::High => &self.match_high,
            Confidence::None => &self.match_none,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if live_book {
            self.match_live_book.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_profile(&self, created: bool, linked: bool, merged: usize) {
        if created {
            self.profiles_created.fetch_add(1, Ordering::Relaxed);
        }
        if linked {
            self.profiles_linked.fetch_add(1, Ordering::Relaxed);
        }
        self.profiles_merged
            .fetch_add(merged as u64, Ordering::Relaxed);
    }

    pub fn record_dedup(&self, status: DedupStatus) {
        match status {
            DedupStatus::Kept => {
                self.dedup_kept.fetch_add(1, Ordering::Relaxed);
            }
            DedupStatus::RemovedDuplicate => {
                self.dedup_removed.fetch_add(1, Ordering::Relaxed);
            }
            DedupStatus::NotApplicable => {
                self.dedup_not_applicable.fetch_add(1, Ordering::Relaxed);
            }
            DedupStatus::PendingDedup => {}
        }
    }

    pub fn record_replay(&self) {
        self.offers_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Approve => &self.eligibility_approve,
            Verdict::Review => &self.eligibility_review,
            Verdict::Reject => &self.eligibility_reject,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a commit conflict; `retried` is false once it reaches the caller.
    pub fn record_conflict(&self, retried: bool) {
        if retried {
            self.conflicts_retried.fetch_add(1, Ordering::Relaxed);
        } else {
            self.conflicts_surfaced.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        let bucket = if micros < 1000 {
            &self.latency_under_1ms
        } else if micros < 5000 {
            &self.latency_1_5ms
        } else if micros < 10000 {
            &self.latency_5_10ms
        } else if micros < 50000 {
            &self.latency_10_50ms
        } else {
            &self.latency_over_50ms
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_journal_write(&self, success: bool) {
        self.journal_writes_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.journal_write_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rule_book_reload(&self, success: bool) {
        self.rule_book_reloads_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.rule_book_reload_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        format!(
            r#"# HELP dedupr_records_total Records accepted for processing
# TYPE dedupr_records_total counter
dedupr_records_total {}

# HELP dedupr_validation_errors_total Records refused by validation
# TYPE dedupr_validation_errors_total counter
dedupr_validation_errors_total {}

# HELP dedupr_matches Match decisions by confidence
# TYPE dedupr_matches counter
dedupr_matches{{confidence="EXACT"}} {}
dedupr_matches{{confidence="HIGH"}} {}
dedupr_matches{{confidence="NONE"}} {}

# HELP dedupr_live_book_matches_total Matches resolved against the live book
# TYPE dedupr_live_book_matches_total counter
dedupr_live_book_matches_total {}

# HELP dedupr_profiles Profile lifecycle events
# TYPE dedupr_profiles counter
dedupr_profiles{{event="created"}} {}
dedupr_profiles{{event="linked"}} {}
dedupr_profiles{{event="merged"}} {}

# HELP dedupr_dedup_outcomes Offer deduplication outcomes
# TYPE dedupr_dedup_outcomes counter
dedupr_dedup_outcomes{{status="KEPT"}} {}
dedupr_dedup_outcomes{{status="REMOVED_DUPLICATE"}} {}
dedupr_dedup_outcomes{{status="NOT_APPLICABLE"}} {}

# HELP dedupr_offers_replayed_total Offers already committed and reported as stored
# TYPE dedupr_offers_replayed_total counter
dedupr_offers_replayed_total {}

# HELP dedupr_eligibility Eligibility verdicts
# TYPE dedupr_eligibility counter
dedupr_eligibility{{verdict="APPROVE"}} {}
dedupr_eligibility{{verdict="REVIEW"}} {}
dedupr_eligibility{{verdict="REJECT"}} {}

# HELP dedupr_conflicts Optimistic commit conflicts
# TYPE dedupr_conflicts counter
dedupr_conflicts{{outcome="retried"}} {}
dedupr_conflicts{{outcome="surfaced"}} {}

# HELP dedupr_record_latency_bucket Record processing latency histogram
# TYPE dedupr_record_latency_bucket counter
dedupr_record_latency_bucket{{le="0.001"}} {}
dedupr_record_latency_bucket{{le="0.005"}} {}
dedupr_record_latency_bucket{{le="0.01"}} {}
dedupr_record_latency_bucket{{le="0.05"}} {}
dedupr_record_latency_bucket{{le="+Inf"}} {}

# HELP dedupr_journal_writes_total Audit journal appends
# TYPE dedupr_journal_writes_total counter
dedupr_journal_writes_total {}

# HELP dedupr_journal_write_errors_total Audit journal append failures
# TYPE dedupr_journal_write_errors_total counter
dedupr_journal_write_errors_total {}

# HELP dedupr_rule_book_reloads_total Rule book reload attempts
# TYPE dedupr_rule_book_reloads_total counter
dedupr_rule_book_reloads_total {}

# HELP dedupr_rule_book_reload_errors_total Rule book reload failures
# TYPE dedupr_rule_book_reload_errors_total counter
dedupr_rule_book_reload_errors_total {}
"#,
            load(&self.records_total),
            load(&self.validation_errors),
            load(&self.match_exact),
            load(&self.match_high),
            load(&self.match_none),
            load(&self.match_live_book),
            load(&self.profiles_created),
            load(&self.profiles_linked),
            load(&self.profiles_merged),
            load(&self.dedup_kept),
            load(&self.dedup_removed),
            load(&self.dedup_not_applicable),
            load(&self.offers_replayed),
            load(&self.eligibility_approve),
            load(&self.eligibility_review),
            load(&self.eligibility_reject),
            load(&self.conflicts_retried),
            load(&self.conflicts_surfaced),
            load(&self.latency_under_1ms),
            load(&self.latency_1_5ms),
            load(&self.latency_5_10ms),
            load(&self.latency_10_50ms),
            load(&self.latency_over_50ms),
            load(&self.journal_writes_total),
            load(&self.journal_write_errors),
            load(&self.rule_book_reloads_total),
            load(&self.rule_book_reload_errors),
        )
    }
}

/// Records the elapsed time into the latency histogram when dropped.
pub struct TimingGuard<'a> {
    metrics: &'a EngineMetrics,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(metrics: &'a EngineMetrics) -> Self {
        TimingGuard {
            metrics,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.metrics.record_latency(self.start);
    }
}
