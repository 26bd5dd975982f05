use ahash::AHasher;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of shards for the lock pool.
/// Must be a power of 2 for fast modulo via bitwise AND.
const NUM_SHARDS: usize = 64;

/// State guarded by one identity key lock.
#[derive(Debug)]
pub struct KeyLock {
    key: String,
    last_used: Instant,
    acquisitions: u64,
}

impl KeyLock {
    fn new(key: String) -> Self {
        KeyLock {
            key,
            last_used: Instant::now(),
            acquisitions: 0,
        }
    }

    /// Mark the lock as used by the current holder.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
        self.acquisitions += 1;
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions
    }

    fn is_idle(&self, idle: Duration) -> bool {
        self.last_used.elapsed() >= idle
    }
}

/// Per-identity-key mutexes with sharded lookup.
///
/// Invocations that share a strong identity key are serialized; unrelated
/// keys proceed in parallel. Keys are spread across shards by hash to keep
/// contention on the map itself low.
pub struct LockPool {
    shards: Vec<RwLock<HashMap<String, Arc<Mutex<KeyLock>>>>>,
}

impl LockPool {
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        LockPool { shards }
    }

    /// Get or create the lock for an identity key.
    pub fn lock_for(&self, key: &str) -> Arc<Mutex<KeyLock>> {
        let shard = &self.shards[self.shard_index(key)];

        // Fast path: lock already exists
        {
            let read_guard = shard.read();
            if let Some(lock) = read_guard.get(key) {
                return lock.clone();
            }
        }

        let mut write_guard = shard.write();

        // Double-check after acquiring write lock
        if let Some(lock) = write_guard.get(key) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(KeyLock::new(key.to_string())));
        write_guard.insert(key.to_string(), lock.clone());
        lock
    }

    /// Locks for every key, deduplicated and in ascending key order.
    ///
    /// Callers that take several keys must acquire them in the returned
    /// order; a shared order is what keeps overlapping key sets deadlock-free.
    pub fn locks_for(&self, keys: &[String]) -> Vec<Arc<Mutex<KeyLock>>> {
        let mut keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter().map(|key| self.lock_for(key)).collect()
    }

    /// Drop locks nobody holds or waits on that were unused for `idle`.
    ///
    /// Returns the number of locks evicted.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut evicted = 0;

        for shard in &self.shards {
            let mut write_guard = shard.write();
            let before = write_guard.len();

            write_guard.retain(|_, lock| {
                // The map's own reference is the only one left
                if Arc::strong_count(lock) > 1 {
                    return true;
                }
                match lock.try_lock() {
                    Some(state) => !state.is_idle(idle),
                    None => true,
                }
            });

            evicted += before - write_guard.len();
        }

        evicted
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> LockPoolStats {
        let mut total_locks = 0;
        let mut total_acquisitions = 0;
        let mut shard_sizes = Vec::with_capacity(NUM_SHARDS);

        for shard in &self.shards {
            let read_guard = shard.read();
            shard_sizes.push(read_guard.len());
            total_locks += read_guard.len();

            for lock in read_guard.values() {
                if let Some(state) = lock.try_lock() {
                    total_acquisitions += state.acquisitions();
                }
            }
        }

        LockPoolStats {
            total_locks,
            total_acquisitions,
            shard_sizes,
        }
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (NUM_SHARDS - 1)
    }
}

impl Default for LockPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the lock pool.
#[derive(Debug)]
pub struct LockPoolStats {
    pub total_locks: usize,
    /// Acquisitions across locks not held at the time of the call
    pub total_acquisitions: u64,
    pub shard_sizes: Vec<usize>,
}
