//! Memoizing Cache Module
//!
//! Get-or-compute on top of a [`BoundedStore`], with deadline checks and
//! background bump renewal.

use std::convert::Infallible;
use std::hash::Hash;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::cache::{
    BoundedStore, CacheStats, Deadline, Entry, LookupCounter, MemoryPressure, PreviousItem,
};
use crate::config::Config;
use crate::tasks::RenewalQueue;

type Stored<K, V> = Arc<Entry<K, V>>;

// == Memo Cache ==
/// A memoizing cache with one value type per instance.
///
/// "Not found", "expired" and "evicted" all look the same: no value. Expired
/// entries are only checked lazily and stay in the store until overwritten
/// or removed. Clones share the same storage.
pub struct MemoCache<K, V> {
    store: Arc<BoundedStore<K, Stored<K, V>>>,
    lookups: Arc<LookupCounter>,
    renewals: RenewalQueue,
}

impl<K, V> Clone for MemoCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lookups: Arc::clone(&self.lookups),
            renewals: self.renewals.clone(),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an unlimited cache that only purges when asked to.
    pub fn new() -> Self {
        Self::with_store(BoundedStore::new(0, 0))
    }

    /// Creates a cache from configuration, purged whenever `pressure` fires.
    pub fn from_config(config: &Config, pressure: &MemoryPressure) -> Self {
        Self::with_store(BoundedStore::from_config(config, Some(pressure)))
    }

    /// Wraps an existing bounded store.
    pub fn with_store(store: BoundedStore<K, Stored<K, V>>) -> Self {
        let renewals = RenewalQueue::spawn(store.name());
        Self {
            store: Arc::new(store),
            lookups: Arc::new(LookupCounter::new()),
            renewals,
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, computing and storing a permanent
    /// one on a miss.
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get_or_compute_with(key, None, None, |_| compute())
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a freshly computed
    /// value expires at `expires`.
    pub fn get_or_compute_expiring<F>(&self, key: K, expires: Deadline, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get_or_compute_with(key, Some(expires), None, |_| compute())
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a hit on an
    /// expiring entry renews its deadline by `bump` in the background.
    ///
    /// A miss stores the computed value with no expiry at all.
    pub fn get_or_compute_bumping<F>(&self, key: K, bump: Deadline, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get_or_compute_with(key, None, Some(bump), |_| compute())
    }

    /// Full get-or-compute.
    ///
    /// `compute` receives the entry being replaced when one is present but
    /// expired.
    pub fn get_or_compute_with<F>(
        &self,
        key: K,
        expires: Option<Deadline>,
        bump: Option<Deadline>,
        compute: F,
    ) -> V
    where
        F: FnOnce(Option<PreviousItem<V>>) -> V,
    {
        match self.try_get_or_compute_with(key, expires, bump, |previous| {
            Ok::<V, Infallible>(compute(previous))
        }) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible get-or-compute. An error from `compute` is returned as is and
    /// nothing is stored.
    ///
    /// Precedence:
    /// 1. live entry with an expiry: hit, renewed in the background if `bump`
    ///    is given, the pre-renewal value is returned
    /// 2. entry without an expiry: hit, `bump` is ignored
    /// 3. otherwise: miss, the new value is stored under `expires` (never
    ///    under `bump`)
    pub fn try_get_or_compute_with<F, E>(
        &self,
        key: K,
        expires: Option<Deadline>,
        bump: Option<Deadline>,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce(Option<PreviousItem<V>>) -> Result<V, E>,
    {
        let existing = self.store.get(&key);

        if let Some(entry) = &existing {
            if entry.is_expiring_after(Utc::now()) {
                self.lookups.record_hit();
                if let Some(by) = bump {
                    self.schedule_renewal(Arc::clone(entry), by);
                }
                return Ok(entry.value().clone());
            }
            if entry.expires_at().is_none() {
                self.lookups.record_hit();
                return Ok(entry.value().clone());
            }
        }

        self.lookups.record_miss();
        debug!(expired = existing.is_some(), "Cache miss, computing value");
        let previous = existing.map(|entry| entry.previous_item());
        let value = compute(previous)?;
        self.store
            .set(key.clone(), Arc::new(Entry::new(key, value.clone(), expires)));
        Ok(value)
    }

    // == Background Renewal ==
    fn schedule_renewal(&self, entry: Stored<K, V>, by: Deadline) {
        let store = Arc::clone(&self.store);
        self.renewals.dispatch(move || {
            let renewed = entry.renewed(&by);
            debug!(deadline = %by, expires_at = ?renewed.expires_at(), "Renewed entry");
            store.set(renewed.key().clone(), Arc::new(renewed));
        });
    }

    // == Get ==
    /// Returns the value for `key` if present and not expired. Never computes,
    /// renews or removes anything.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.store.get(key) {
            Some(entry) if entry.is_live(Utc::now()) => {
                self.lookups.record_hit();
                Some(entry.value().clone())
            }
            _ => {
                self.lookups.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` permanently, replacing any previous entry.
    pub fn set(&self, key: K, value: V) {
        self.store
            .set(key.clone(), Arc::new(Entry::new(key, value, None)));
    }

    /// Stores `value` permanently with an eviction cost.
    pub fn set_with_cost(&self, key: K, value: V, cost: u64) {
        self.store
            .set_with_cost(key.clone(), Arc::new(Entry::new(key, value, None)), cost);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    // == Pop ==
    /// Returns the live value for `key`, if any, and removes the entry either
    /// way.
    pub fn pop(&self, key: &K) -> Option<V> {
        let value = self.get(key);
        self.remove_value(key);
        value
    }

    pub fn remove_value(&self, key: &K) {
        self.store.remove(key);
    }

    pub fn remove_all(&self) {
        self.store.remove_all();
    }

    /// Drops everything, counted as a memory-pressure purge.
    pub fn purge_all(&self) {
        self.store.purge_all();
    }

    // == Limits ==
    pub fn count_limit(&self) -> usize {
        self.store.count_limit()
    }

    pub fn set_count_limit(&self, limit: usize) {
        self.store.set_count_limit(limit);
    }

    pub fn total_cost_limit(&self) -> u64 {
        self.store.total_cost_limit()
    }

    pub fn set_total_cost_limit(&self, limit: u64) {
        self.store.set_total_cost_limit(limit);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Store counters plus hits and misses as seen through this cache, where
    /// an expired entry counts as a miss.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.store.stats();
        self.lookups.fill(&mut stats);
        stats
    }
}

impl<K, V> Default for MemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for MemoCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoCache")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
