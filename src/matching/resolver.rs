use chrono::{DateTime, Utc};
use smallvec::SmallVec;
use std::cmp::Ordering;
use tracing::debug;

use crate::domain::{
    Confidence, CustomerProfile, LiveBookRecord, MatchDecision, MatchField, MatchSource,
    NormalizedIdentity,
};

use super::similarity::name_similarity;

/// Default token-overlap ratio required alongside a mobile or email match.
pub const DEFAULT_NAME_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Match resolver tuning.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    pub name_similarity_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            name_similarity_threshold: DEFAULT_NAME_SIMILARITY_THRESHOLD,
        }
    }
}

/// Consistent snapshot of candidates for one resolution.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePool<'a> {
    pub live_book: &'a [LiveBookRecord],
    pub internal: &'a [CustomerProfile],
}

impl<'a> CandidatePool<'a> {
    pub fn new(live_book: &'a [LiveBookRecord], internal: &'a [CustomerProfile]) -> Self {
        CandidatePool {
            live_book,
            internal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.live_book.is_empty() && self.internal.is_empty()
    }
}

/// The matching ladder, strongest first. The first rung that fires wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rung {
    Pan = 1,
    Aadhaar = 2,
    MobileAndName = 3,
    EmailAndName = 4,
}

impl Rung {
    fn confidence(&self) -> Confidence {
        match self {
            Rung::Pan | Rung::Aadhaar => Confidence::Exact,
            Rung::MobileAndName | Rung::EmailAndName => Confidence::High,
        }
    }
}

/// How one candidate matched.
#[derive(Debug, Clone)]
struct CandidateMatch {
    index: usize,
    rung: Rung,
    fields: SmallVec<[MatchField; 4]>,
    updated_at: DateTime<Utc>,
    id: String,
}

impl CandidateMatch {
    /// Stronger rung first, then most recently updated, then lowest id.
    fn precedence(&self, other: &Self) -> Ordering {
        self.rung
            .cmp(&other.rung)
            .then_with(|| other.updated_at.cmp(&self.updated_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Finds the existing customer an incoming identity belongs to.
#[derive(Debug, Clone, Default)]
pub struct MatchResolver {
    config: MatchConfig,
}

impl MatchResolver {
    pub fn new(config: MatchConfig) -> Self {
        MatchResolver { config }
    }

    /// Resolve an identity against a candidate pool.
    ///
    /// A live-book match always wins over an internal one; the internal
    /// profile is then reported as the one to link to the live-book record.
    /// An empty pool yields `NONE`.
    pub fn resolve(&self, identity: &NormalizedIdentity, pool: &CandidatePool<'_>) -> MatchDecision {
        if pool.is_empty() || identity.is_empty() {
            return MatchDecision::none();
        }

        let live = self.best_match(
            identity,
            pool.live_book
                .iter()
                .map(|r| (r.identity(), r.updated_at, r.live_book_id.as_str())),
        );

        let internal_active: Vec<&CustomerProfile> =
            pool.internal.iter().filter(|p| p.is_active()).collect();
        let internal = self.best_match(
            identity,
            internal_active
                .iter()
                .map(|p| (p.identity(), p.updated_at, p.customer_id.as_str())),
        );

        if let Some(live) = live {
            let record = &pool.live_book[live.index];
            let linked = internal_active
                .iter()
                .find(|p| p.live_book_id.as_deref() == Some(record.live_book_id.as_str()))
                .copied()
                .or_else(|| {
                    internal
                        .as_ref()
                        .map(|m| internal_active[m.index])
                        .filter(|p| p.live_book_id.is_none())
                });

            debug!(
                live_book_id = %record.live_book_id,
                confidence = %live.rung.confidence(),
                linked_profile = ?linked.map(|p| p.customer_id.as_str()),
                "Live book match"
            );

            return MatchDecision {
                matched_profile_id: linked.map(|p| p.customer_id.clone()),
                live_book_id: Some(record.live_book_id.clone()),
                confidence: live.rung.confidence(),
                matched_fields: live.fields,
                source: MatchSource::LiveBook,
            };
        }

        if let Some(internal) = internal {
            let profile = internal_active[internal.index];
            debug!(
                customer_id = %profile.customer_id,
                confidence = %internal.rung.confidence(),
                "Internal profile match"
            );

            return MatchDecision {
                matched_profile_id: Some(profile.customer_id.clone()),
                live_book_id: profile.live_book_id.clone(),
                confidence: internal.rung.confidence(),
                matched_fields: internal.fields,
                source: MatchSource::Internal,
            };
        }

        MatchDecision::none()
    }

    /// The single best live-book record for an identity, if any matches.
    pub fn lookup_live_book<'a>(
        &self,
        identity: &NormalizedIdentity,
        records: &'a [LiveBookRecord],
    ) -> Option<&'a LiveBookRecord> {
        self.best_match(
            identity,
            records
                .iter()
                .map(|r| (r.identity(), r.updated_at, r.live_book_id.as_str())),
        )
        .map(|m| &records[m.index])
    }

    fn best_match<'a, I>(&self, identity: &NormalizedIdentity, candidates: I) -> Option<CandidateMatch>
    where
        I: Iterator<Item = (NormalizedIdentity, DateTime<Utc>, &'a str)>,
    {
        candidates
            .enumerate()
            .filter_map(|(index, (candidate, updated_at, id))| {
                self.classify(identity, &candidate).map(|(rung, fields)| CandidateMatch {
                    index,
                    rung,
                    fields,
                    updated_at,
                    id: id.to_string(),
                })
            })
            .min_by(|a, b| a.precedence(b))
    }

    /// The strongest rung on which `candidate` matches `incoming`.
    fn classify(
        &self,
        incoming: &NormalizedIdentity,
        candidate: &NormalizedIdentity,
    ) -> Option<(Rung, SmallVec<[MatchField; 4]>)> {
        let pan = same(&incoming.pan_number, &candidate.pan_number);
        let aadhaar = same(&incoming.aadhaar_number, &candidate.aadhaar_number);
        let mobile = same(&incoming.mobile_number, &candidate.mobile_number);
        let email = same(&incoming.email_id, &candidate.email_id);
        let name = name_similarity(incoming, candidate) >= self.config.name_similarity_threshold;

        let mut fields = SmallVec::new();
        for (agrees, field) in [
            (pan, MatchField::Pan),
            (aadhaar, MatchField::Aadhaar),
            (mobile, MatchField::Mobile),
            (email, MatchField::Email),
            (name, MatchField::Name),
        ] {
            if agrees {
                fields.push(field);
            }
        }

        if pan {
            return Some((Rung::Pan, fields));
        }
        if aadhaar {
            return Some((Rung::Aadhaar, fields));
        }

        // Conflicting hard keys mean different people, whatever the contact details say.
        if differ(&incoming.pan_number, &candidate.pan_number)
            || differ(&incoming.aadhaar_number, &candidate.aadhaar_number)
        {
            return None;
        }

        if mobile && name {
            return Some((Rung::MobileAndName, fields));
        }
        if email && name {
            return Some((Rung::EmailAndName, fields));
        }
        None
    }
}

fn same(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

fn differ(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x != y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CustomerId;
    use chrono::Duration;

    fn profile(id: &str, identity: NormalizedIdentity, age_minutes: i64) -> CustomerProfile {
        let mut p = CustomerProfile::from_identity(CustomerId::new(id), &identity);
        p.updated_at = Utc::now() - Duration::minutes(age_minutes);
        p
    }

    fn ident(pan: Option<&str>, mobile: Option<&str>, first: &str, last: &str) -> NormalizedIdentity {
        NormalizedIdentity {
            pan_number: pan.map(str::to_string),
            mobile_number: mobile.map(str::to_string),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            ..Default::default()
        }
    }

    fn live_record(id: &str, pan: Option<&str>, mobile: Option<&str>) -> LiveBookRecord {
        LiveBookRecord {
            live_book_id: id.to_string(),
            mobile_number: mobile.map(str::to_string),
            pan_number: pan.map(str::to_string),
            aadhaar_number: None,
            email_id: None,
            first_name: Some("Ravi".to_string()),
            last_name: Some("Kumar".to_string()),
            date_of_birth: None,
            active_loans: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_pool_is_none() {
        let resolver = MatchResolver::default();
        let incoming = ident(Some("ABCDE1234F"), None, "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &[]));
        assert_eq!(decision, MatchDecision::none());
    }

    #[test]
    fn test_exact_pan_match() {
        let resolver = MatchResolver::default();
        let internal = vec![profile(
            "C1",
            ident(Some("ABCDE1234F"), Some("9000000000"), "R", "K"),
            10,
        )];
        let incoming = ident(Some("ABCDE1234F"), Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));

        assert_eq!(decision.confidence, Confidence::Exact);
        assert_eq!(decision.matched_profile_id, Some(CustomerId::new("C1")));
        assert_eq!(decision.source, MatchSource::Internal);
        assert!(decision.matched_fields.contains(&MatchField::Pan));
    }

    #[test]
    fn test_pan_beats_more_recent_mobile_match() {
        let resolver = MatchResolver::default();
        let internal = vec![
            profile("C-MOBILE", ident(None, Some("9876543210"), "Ravi", "Kumar"), 0),
            profile("C-PAN", ident(Some("ABCDE1234F"), None, "R", "K"), 600),
        ];
        let incoming = ident(Some("ABCDE1234F"), Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));

        assert_eq!(decision.matched_profile_id, Some(CustomerId::new("C-PAN")));
        assert_eq!(decision.confidence, Confidence::Exact);
    }

    #[test]
    fn test_mobile_requires_name_similarity() {
        let resolver = MatchResolver::default();
        let internal = vec![profile("C1", ident(None, Some("9876543210"), "Asha", "Rao"), 0)];
        let incoming = ident(None, Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));
        assert_eq!(decision.confidence, Confidence::None);

        let incoming = ident(None, Some("9876543210"), "ASHA", "rao");
        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));
        assert_eq!(decision.confidence, Confidence::High);
        assert_eq!(decision.matched_profile_id, Some(CustomerId::new("C1")));
    }

    #[test]
    fn test_email_and_name_match() {
        let resolver = MatchResolver::default();
        let mut existing = ident(None, None, "Ravi", "Kumar");
        existing.email_id = Some("ravi@example.in".to_string());
        let internal = vec![profile("C1", existing, 0)];

        let mut incoming = ident(None, Some("9123456789"), "Ravi", "Kumar");
        incoming.email_id = Some("ravi@example.in".to_string());

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));
        assert_eq!(decision.confidence, Confidence::High);
        assert!(decision.matched_fields.contains(&MatchField::Email));
        assert!(!decision.matched_fields.contains(&MatchField::Mobile));
    }

    #[test]
    fn test_conflicting_pan_blocks_soft_match() {
        let resolver = MatchResolver::default();
        let internal = vec![profile(
            "C1",
            ident(Some("ZZZZZ9999Z"), Some("9876543210"), "Ravi", "Kumar"),
            0,
        )];
        let incoming = ident(Some("ABCDE1234F"), Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));
        assert_eq!(decision.confidence, Confidence::None);
    }

    #[test]
    fn test_tie_prefers_most_recent() {
        let resolver = MatchResolver::default();
        let internal = vec![
            profile("C-OLD", ident(None, Some("9876543210"), "Ravi", "Kumar"), 120),
            profile("C-NEW", ident(None, Some("9876543210"), "Ravi", "Kumar"), 5),
        ];
        let incoming = ident(None, Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));
        assert_eq!(decision.matched_profile_id, Some(CustomerId::new("C-NEW")));
    }

    #[test]
    fn test_merged_profiles_ignored() {
        let resolver = MatchResolver::default();
        let mut merged = profile("C-MERGED", ident(Some("ABCDE1234F"), None, "R", "K"), 0);
        merged.mark_merged_into(&CustomerId::new("C-SURVIVOR"));
        let internal = vec![merged];

        let incoming = ident(Some("ABCDE1234F"), None, "Ravi", "Kumar");
        let decision = resolver.resolve(&incoming, &CandidatePool::new(&[], &internal));
        assert_eq!(decision.confidence, Confidence::None);
    }

    #[test]
    fn test_live_book_wins_and_links_internal() {
        let resolver = MatchResolver::default();
        let live = vec![live_record("LB-1", None, Some("9876543210"))];
        let internal = vec![profile("C1", ident(Some("ABCDE1234F"), None, "Ravi", "Kumar"), 0)];
        let incoming = ident(Some("ABCDE1234F"), Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&live, &internal));

        assert_eq!(decision.source, MatchSource::LiveBook);
        assert_eq!(decision.live_book_id.as_deref(), Some("LB-1"));
        assert_eq!(decision.confidence, Confidence::High);
        assert_eq!(decision.matched_profile_id, Some(CustomerId::new("C1")));
    }

    #[test]
    fn test_live_book_prefers_already_linked_profile() {
        let resolver = MatchResolver::default();
        let live = vec![live_record("LB-1", Some("ABCDE1234F"), None)];
        let mut linked = profile("C-LINKED", ident(None, Some("9000000001"), "Ravi", "Kumar"), 300);
        linked.live_book_id = Some("LB-1".to_string());
        let internal = vec![
            profile("C-MOBILE", ident(None, Some("9876543210"), "Ravi", "Kumar"), 0),
            linked,
        ];
        let incoming = ident(Some("ABCDE1234F"), Some("9876543210"), "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&live, &internal));

        assert_eq!(decision.confidence, Confidence::Exact);
        assert_eq!(decision.matched_profile_id, Some(CustomerId::new("C-LINKED")));
    }

    #[test]
    fn test_live_book_only_match_has_no_profile() {
        let resolver = MatchResolver::default();
        let live = vec![live_record("LB-1", Some("ABCDE1234F"), None)];
        let incoming = ident(Some("ABCDE1234F"), None, "Ravi", "Kumar");

        let decision = resolver.resolve(&incoming, &CandidatePool::new(&live, &[]));
        assert!(decision.is_match());
        assert!(decision.matched_profile_id.is_none());
        assert_eq!(decision.live_book_id.as_deref(), Some("LB-1"));

        let found = resolver.lookup_live_book(&incoming, &live).unwrap();
        assert_eq!(found.live_book_id, "LB-1");
    }
}
