use ahash::AHashMap;
use bloomfilter::Bloom;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

use crate::domain::{
    CustomerId, CustomerProfile, LiveBookRecord, NormalizedIdentity, Offer, OfferId, RawIdentity,
};
use crate::normalize::normalize;

use super::snapshot::StateSnapshot;
use super::traits::{Commit, CustomerStore, LiveBook, StoreError};

/// Identity key ("pan:..", "mobile:..") to the ids holding it.
#[derive(Debug, Default)]
struct KeyIndex {
    entries: AHashMap<String, SmallVec<[String; 2]>>,
}

impl KeyIndex {
    fn insert(&mut self, key: String, id: &str) {
        let ids = self.entries.entry(key).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    fn remove(&mut self, key: &str, id: &str) {
        if let Some(ids) = self.entries.get_mut(key) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    fn get(&self, key: &str) -> &[String] {
        self.entries.get(key).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    /// Distinct ids sharing any of `keys`, in first-seen order.
    fn lookup(&self, keys: &[String]) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for key in keys {
            for id in self.get(key) {
                if !found.contains(id) {
                    found.push(id.clone());
                }
            }
        }
        found
    }
}

#[derive(Debug, Default)]
struct StoreState {
    profiles: AHashMap<CustomerId, CustomerProfile>,
    offers: AHashMap<OfferId, Offer>,
    offers_by_customer: AHashMap<CustomerId, Vec<OfferId>>,
    keys: KeyIndex,
    live_book_links: KeyIndex,
}

impl StoreState {
    fn put_profile(&mut self, profile: CustomerProfile) {
        let id = profile.customer_id.as_str().to_string();

        if let Some(old) = self.profiles.get(&profile.customer_id) {
            for key in old.identity().identity_keys() {
                self.keys.remove(&key, &id);
            }
            if let Some(link) = &old.live_book_id {
                self.live_book_links.remove(link, &id);
            }
        }

        for key in profile.identity().identity_keys() {
            self.keys.insert(key, &id);
        }
        if let Some(link) = &profile.live_book_id {
            self.live_book_links.insert(link.clone(), &id);
        }

        self.profiles.insert(profile.customer_id.clone(), profile);
    }

    fn put_offer(&mut self, offer: Offer) -> Result<(), StoreError> {
        let customer_id = offer
            .customer_id
            .clone()
            .ok_or_else(|| StoreError::UnownedOffer(offer.offer_id.to_string()))?;

        if !self.offers.contains_key(&offer.offer_id) {
            self.offers_by_customer
                .entry(customer_id)
                .or_default()
                .push(offer.offer_id.clone());
        }
        self.offers.insert(offer.offer_id.clone(), offer);
        Ok(())
    }

    fn active_profiles(&self, ids: Vec<String>) -> Vec<CustomerProfile> {
        let mut profiles: Vec<CustomerProfile> = ids
            .into_iter()
            .filter_map(|id| self.profiles.get(&CustomerId::new(id)))
            .filter(|profile| profile.is_active())
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
        profiles
    }

    /// A profile as it will look once `commit` is applied.
    fn effective<'a>(&'a self, commit: &'a Commit, id: &CustomerId) -> Option<&'a CustomerProfile> {
        commit
            .profiles
            .iter()
            .map(|w| &w.profile)
            .find(|p| &p.customer_id == id)
            .or_else(|| self.profiles.get(id))
    }

    fn validate(&self, commit: &Commit) -> Result<(), StoreError> {
        for write in &commit.profiles {
            let found = self
                .profiles
                .get(&write.profile.customer_id)
                .map(|p| p.version);
            if found != write.expected_version {
                return Err(StoreError::ConcurrencyConflict {
                    customer_id: write.profile.customer_id.to_string(),
                    expected: write.expected_version,
                    found,
                });
            }
        }

        for write in commit.profiles.iter().filter(|w| w.profile.is_active()) {
            let profile = &write.profile;
            let unique_fields = [
                ("pan_number", "pan", &profile.pan_number),
                ("aadhaar_number", "aadhaar", &profile.aadhaar_number),
            ];

            for (field, prefix, value) in unique_fields {
                let Some(value) = value else { continue };
                let key = format!("{}:{}", prefix, value);

                let stored = self.keys.get(&key).iter().map(|id| CustomerId::new(id.clone()));
                let pending = commit.profiles.iter().map(|w| w.profile.customer_id.clone());

                for other_id in stored.chain(pending) {
                    if other_id == profile.customer_id {
                        continue;
                    }
                    let Some(other) = self.effective(commit, &other_id) else {
                        continue;
                    };
                    let holds_value = match field {
                        "pan_number" => other.pan_number.as_ref() == Some(value),
                        _ => other.aadhaar_number.as_ref() == Some(value),
                    };
                    if other.is_active() && holds_value {
                        return Err(StoreError::UniqueIdentityViolation {
                            field,
                            customer_id: other_id.to_string(),
                        });
                    }
                }
            }
        }

        for offer in &commit.offers {
            let customer_id = offer
                .customer_id
                .as_ref()
                .ok_or_else(|| StoreError::UnownedOffer(offer.offer_id.to_string()))?;
            if self.effective(commit, customer_id).is_none() {
                return Err(StoreError::UnknownCustomer {
                    offer_id: offer.offer_id.to_string(),
                    customer_id: customer_id.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// In-memory customer store.
///
/// All commits are serialized behind one write lock; reads share it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a saved snapshot.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Result<Self, StoreError> {
        let mut state = StoreState::default();
        for profile in snapshot.profiles {
            state.put_profile(profile);
        }
        for offer in snapshot.offers {
            state.put_offer(offer)?;
        }
        Ok(MemoryStore {
            state: RwLock::new(state),
        })
    }

    /// Capture every profile and offer, ordered by id.
    pub fn to_snapshot(&self) -> StateSnapshot {
        let state = self.state.read();

        let mut profiles: Vec<CustomerProfile> = state.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

        let mut offers: Vec<Offer> = state.offers.values().cloned().collect();
        offers.sort_by(|a, b| a.offer_id.cmp(&b.offer_id));

        StateSnapshot::new(profiles, offers)
    }

    pub fn profile_count(&self) -> usize {
        self.state.read().profiles.len()
    }

    pub fn offer_count(&self) -> usize {
        self.state.read().offers.len()
    }
}

impl CustomerStore for MemoryStore {
    fn candidates(&self, identity: &NormalizedIdentity) -> Vec<CustomerProfile> {
        let state = self.state.read();
        let ids = state.keys.lookup(&identity.identity_keys());
        state.active_profiles(ids)
    }

    fn linked_to(&self, live_book_id: &str) -> Vec<CustomerProfile> {
        let state = self.state.read();
        let ids = state.live_book_links.get(live_book_id).to_vec();
        state.active_profiles(ids)
    }

    fn profile(&self, customer_id: &CustomerId) -> Option<CustomerProfile> {
        self.state.read().profiles.get(customer_id).cloned()
    }

    fn offers_for_customer(&self, customer_id: &CustomerId) -> Vec<Offer> {
        let state = self.state.read();
        state
            .offers_by_customer
            .get(customer_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.offers.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn offer(&self, offer_id: &OfferId) -> Option<Offer> {
        self.state.read().offers.get(offer_id).cloned()
    }

    fn commit(&self, commit: Commit) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.validate(&commit)?;

        for write in commit.profiles {
            let mut profile = write.profile;
            profile.version = write.expected_version.map_or(1, |v| v + 1);
            state.put_profile(profile);
        }
        for offer in commit.offers {
            state.put_offer(offer)?;
        }

        Ok(())
    }
}

/// Errors loading a live-book file.
#[derive(Error, Debug)]
pub enum LiveBookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Immutable in-memory live book.
///
/// Uses a bloom filter over identity keys for fast negative lookups, the
/// common case for first-time applicants.
pub struct MemoryLiveBook {
    records: AHashMap<String, LiveBookRecord>,
    keys: KeyIndex,
    bloom: Bloom<String>,
}

impl MemoryLiveBook {
    /// Index live-book records, canonicalizing their identity fields.
    pub fn new(records: Vec<LiveBookRecord>) -> Self {
        let item_count = (records.len() * 4).max(100);
        let mut bloom = Bloom::new_for_fp_rate(item_count, 0.01);
        let mut keys = KeyIndex::default();
        let mut by_id = AHashMap::with_capacity(records.len());

        for mut record in records {
            let identity = normalize(&RawIdentity::from(record.identity()));
            record.mobile_number = identity.mobile_number.clone();
            record.pan_number = identity.pan_number.clone();
            record.aadhaar_number = identity.aadhaar_number.clone();
            record.email_id = identity.email_id.clone();
            record.first_name = identity.first_name.clone();
            record.last_name = identity.last_name.clone();

            for key in identity.identity_keys() {
                bloom.set(&key);
                keys.insert(key, &record.live_book_id);
            }
            by_id.insert(record.live_book_id.clone(), record);
        }

        MemoryLiveBook {
            records: by_id,
            keys,
            bloom,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load a JSON array of live-book records.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LiveBookError> {
        let reader = BufReader::new(File::open(path)?);
        let records: Vec<LiveBookRecord> = serde_json::from_reader(reader)?;
        Ok(Self::new(records))
    }
}

impl LiveBook for MemoryLiveBook {
    fn candidates(&self, identity: &NormalizedIdentity) -> Vec<LiveBookRecord> {
        // Fast path: bloom filter says no key is present
        let keys: Vec<String> = identity
            .identity_keys()
            .into_iter()
            .filter(|key| self.bloom.check(key))
            .collect();
        if keys.is_empty() {
            return Vec::new();
        }

        let mut records: Vec<LiveBookRecord> = self
            .keys
            .lookup(&keys)
            .into_iter()
            .filter_map(|id| self.records.get(&id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.live_book_id.cmp(&b.live_book_id));
        records
    }

    fn get(&self, live_book_id: &str) -> Option<LiveBookRecord> {
        self.records.get(live_book_id).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActiveLoan, ProductType};
    use crate::store::traits::ProfileWrite;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn profile(id: &str, pan: Option<&str>, mobile: Option<&str>) -> CustomerProfile {
        let identity = NormalizedIdentity {
            pan_number: pan.map(String::from),
            mobile_number: mobile.map(String::from),
            ..Default::default()
        };
        CustomerProfile::from_identity(CustomerId::new(id), &identity)
    }

    fn offer(id: &str, customer: &str) -> Offer {
        let mut offer = Offer::new(
            OfferId::new(id),
            "CMP".to_string(),
            ProductType::Preapproved,
            "CDP".to_string(),
            Decimal::new(100_000, 0),
            24,
            Decimal::new(1200, 2),
        );
        offer.customer_id = Some(CustomerId::new(customer));
        offer
    }

    fn live_record(id: &str, pan: &str) -> LiveBookRecord {
        LiveBookRecord {
            live_book_id: id.to_string(),
            mobile_number: None,
            pan_number: Some(pan.to_string()),
            aadhaar_number: None,
            email_id: None,
            first_name: None,
            last_name: None,
            date_of_birth: None,
            active_loans: vec![ActiveLoan {
                reference_id: format!("LN-{}", id),
                product_type: ProductType::TopUp,
            }],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_commit_and_lookup() {
        let store = MemoryStore::new();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile(
                    "C1",
                    Some("ABCDE1234F"),
                    Some("9876543210"),
                ))],
                offers: vec![offer("O1", "C1")],
            })
            .unwrap();

        let identity = NormalizedIdentity {
            mobile_number: Some("9876543210".to_string()),
            ..Default::default()
        };
        let found = store.candidates(&identity);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, 1);
        assert_eq!(store.offers_for_customer(&CustomerId::new("C1")).len(), 1);
        assert!(store.offer(&OfferId::new("O1")).is_some());
    }

    #[test]
    fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", None, Some("9876543210")))],
                offers: vec![],
            })
            .unwrap();

        let current = store.profile(&CustomerId::new("C1")).unwrap();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::update(current.clone(), current.version)],
                offers: vec![],
            })
            .unwrap();

        let err = store
            .commit(Commit {
                profiles: vec![ProfileWrite::update(current.clone(), current.version)],
                offers: vec![],
            })
            .unwrap_err();
        assert!(err.is_conflict());

        // Creating an existing profile is also a conflict
        let err = store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", None, None))],
                offers: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ConcurrencyConflict { .. }));
    }

    #[test]
    fn test_pan_uniqueness_among_active_profiles() {
        let store = MemoryStore::new();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", Some("ABCDE1234F"), None))],
                offers: vec![],
            })
            .unwrap();

        let err = store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C2", Some("ABCDE1234F"), None))],
                offers: vec![],
            })
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::UniqueIdentityViolation {
                field: "pan_number",
                customer_id: "C1".to_string(),
            }
        );
        assert_eq!(store.profile_count(), 1);
    }

    #[test]
    fn test_merged_profile_releases_pan() {
        let store = MemoryStore::new();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", Some("ABCDE1234F"), None))],
                offers: vec![],
            })
            .unwrap();

        let mut old = store.profile(&CustomerId::new("C1")).unwrap();
        let version = old.version;
        old.mark_merged_into(&CustomerId::new("C2"));

        store
            .commit(Commit {
                profiles: vec![
                    ProfileWrite::update(old, version),
                    ProfileWrite::create(profile("C2", Some("ABCDE1234F"), None)),
                ],
                offers: vec![],
            })
            .unwrap();

        let identity = NormalizedIdentity {
            pan_number: Some("ABCDE1234F".to_string()),
            ..Default::default()
        };
        let active = store.candidates(&identity);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].customer_id.as_str(), "C2");
        assert_eq!(store.profile_count(), 2);
    }

    #[test]
    fn test_failed_commit_has_no_side_effects() {
        let store = MemoryStore::new();
        let err = store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", None, Some("9876543210")))],
                offers: vec![offer("O1", "C9")],
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::UnknownCustomer { .. }));
        assert_eq!(store.profile_count(), 0);
        assert_eq!(store.offer_count(), 0);
    }

    #[test]
    fn test_index_follows_changed_mobile() {
        let store = MemoryStore::new();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", None, Some("9876543210")))],
                offers: vec![],
            })
            .unwrap();

        let mut current = store.profile(&CustomerId::new("C1")).unwrap();
        let version = current.version;
        current.mobile_number = Some("9123456780".to_string());
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::update(current, version)],
                offers: vec![],
            })
            .unwrap();

        let old = NormalizedIdentity {
            mobile_number: Some("9876543210".to_string()),
            ..Default::default()
        };
        let new = NormalizedIdentity {
            mobile_number: Some("9123456780".to_string()),
            ..Default::default()
        };
        assert!(store.candidates(&old).is_empty());
        assert_eq!(store.candidates(&new).len(), 1);
    }

    #[test]
    fn test_snapshot_restores_store() {
        let store = MemoryStore::new();
        store
            .commit(Commit {
                profiles: vec![ProfileWrite::create(profile("C1", Some("ABCDE1234F"), None))],
                offers: vec![offer("O1", "C1"), offer("O2", "C1")],
            })
            .unwrap();

        let restored = MemoryStore::from_snapshot(store.to_snapshot()).unwrap();
        assert_eq!(restored.profile_count(), 1);
        assert_eq!(restored.offers_for_customer(&CustomerId::new("C1")).len(), 2);

        let identity = NormalizedIdentity {
            pan_number: Some("ABCDE1234F".to_string()),
            ..Default::default()
        };
        assert_eq!(restored.candidates(&identity).len(), 1);
    }

    #[test]
    fn test_live_book_lookup_normalizes_records() {
        let mut record = live_record("LB1", "abcde1234f");
        record.mobile_number = Some("+91 98765 43210".to_string());
        let book = MemoryLiveBook::new(vec![record, live_record("LB2", "ZZZZZ9999Z")]);

        let identity = NormalizedIdentity {
            mobile_number: Some("9876543210".to_string()),
            ..Default::default()
        };
        let found = book.candidates(&identity);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].live_book_id, "LB1");
        assert_eq!(found[0].pan_number.as_deref(), Some("ABCDE1234F"));

        let stranger = NormalizedIdentity {
            pan_number: Some("QQQQQ1111Q".to_string()),
            ..Default::default()
        };
        assert!(book.candidates(&stranger).is_empty());
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_live_book_load_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"live_book_id": "LB1", "pan_number": "ABCDE1234F",
                 "active_loans": [{{"reference_id": "LN1", "product_type": "TOP_UP"}}]}}]"#
        )
        .unwrap();

        let book = MemoryLiveBook::load_json(file.path()).unwrap();
        let record = book.get("LB1").unwrap();
        assert!(record.active_loan_for(&ProductType::TopUp).is_some());
    }
}
