//! Bounded Store Module
//!
//! Thread-safe key/value storage limited by entry count and aggregate cost.
//! Exceeding a limit evicts least recently used items; a memory-pressure
//! notification purges everything.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::{CacheStats, LruTracker, MemoryPressure, Purge, Subscription};
use crate::config::Config;

/// Cost assigned by [`BoundedStore::set`].
pub const DEFAULT_COST: u64 = 0;

const DEFAULT_NAME: &str = "bounded_store";

struct Slot<V> {
    value: V,
    cost: u64,
}

// == Store State ==
struct StoreState<K, V> {
    entries: HashMap<K, Slot<V>>,
    lru: LruTracker<K>,
    stats: CacheStats,
    total_cost: u64,
    /// 0 = unlimited
    count_limit: usize,
    /// 0 = unlimited
    total_cost_limit: u64,
}

impl<K: Eq + Hash + Clone, V> StoreState<K, V> {
    fn exceeds_limits(&self) -> bool {
        (self.count_limit > 0 && self.entries.len() > self.count_limit)
            || (self.total_cost_limit > 0 && self.total_cost > self.total_cost_limit)
    }

    // == Enforce Limits ==
    /// Evicts least recently used items until both limits hold.
    fn enforce_limits(&mut self) -> usize {
        let mut evicted = 0;
        while self.exceeds_limits() {
            let Some(victim) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&victim) {
                self.total_cost = self.total_cost.saturating_sub(slot.cost);
                self.stats.record_eviction();
                evicted += 1;
            }
        }
        evicted
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.total_cost = 0;
    }
}

struct Shared<K, V> {
    name: String,
    state: Mutex<StoreState<K, V>>,
}

impl<K, V> Purge for Shared<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Send,
{
    fn purge_all(&self) {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.entries.len();
            state.clear();
            state.stats.record_purge();
            removed
        };
        info!(store = %self.name, removed, "Purged all entries");
    }
}

// == Bounded Store ==
/// Capacity and cost limited map. Items may disappear at any time once a
/// limit is exceeded or memory pressure is signalled; callers must treat
/// every read as possibly missing.
pub struct BoundedStore<K, V> {
    shared: Arc<Shared<K, V>>,
    /// Held for its `Drop`, which deregisters from the pressure signal.
    _subscription: Option<Subscription>,
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    // == Constructor ==
    /// Creates a store with the given limits (0 = unlimited) that only purges
    /// when asked to explicitly.
    pub fn new(count_limit: usize, total_cost_limit: u64) -> Self {
        Self::build(DEFAULT_NAME.to_string(), count_limit, total_cost_limit, None)
    }

    /// Creates a store from configuration, registering it with `pressure`
    /// when one is supplied.
    pub fn from_config(config: &Config, pressure: Option<&MemoryPressure>) -> Self {
        Self::build(
            config.name.clone(),
            config.count_limit,
            config.total_cost_limit,
            pressure,
        )
    }

    fn build(
        name: String,
        count_limit: usize,
        total_cost_limit: u64,
        pressure: Option<&MemoryPressure>,
    ) -> Self {
        let shared = Arc::new(Shared {
            name,
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                stats: CacheStats::new(),
                total_cost: 0,
                count_limit,
                total_cost_limit,
            }),
        });

        let subscription = pressure.map(|signal| {
            let target: Weak<dyn Purge> = Arc::downgrade(&shared) as Weak<dyn Purge>;
            signal.subscribe(target)
        });

        Self {
            shared,
            _subscription: subscription,
        }
    }
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Send,
{
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    // == Get ==
    /// Returns a clone of the stored item and marks it recently used.
    ///
    /// Hits and misses are not counted here: whether a stored item is usable
    /// is up to the caller.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let value = state.entries.get(key)?.value.clone();
        state.lru.touch(key.clone());
        Some(value)
    }

    // == Set ==
    /// Stores `value` with [`DEFAULT_COST`], replacing any previous item.
    pub fn set(&self, key: K, value: V) {
        self.set_with_cost(key, value, DEFAULT_COST);
    }

    /// Stores `value` with an explicit cost, replacing any previous item.
    ///
    /// May evict other items, or this one if it alone exceeds the cost limit.
    pub fn set_with_cost(&self, key: K, value: V, cost: u64) {
        let evicted = {
            let mut state = self.shared.state.lock();
            if let Some(old) = state.entries.insert(key.clone(), Slot { value, cost }) {
                state.total_cost = state.total_cost.saturating_sub(old.cost);
            }
            state.total_cost = state.total_cost.saturating_add(cost);
            state.lru.touch(key);
            state.enforce_limits()
        };

        if evicted > 0 {
            debug!(store = %self.shared.name, evicted, "Evicted entries over limit");
        }
    }

    // == Remove ==
    /// Removes and returns the item for `key`, if any.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.shared.state.lock();
        let slot = state.entries.remove(key)?;
        state.lru.remove(key);
        state.total_cost = state.total_cost.saturating_sub(slot.cost);
        Some(slot.value)
    }

    pub fn remove_all(&self) {
        self.shared.state.lock().clear();
    }

    // == Purge ==
    /// Drops every item, as a memory-pressure notification would.
    pub fn purge_all(&self) {
        self.shared.purge_all();
    }

    // == Limits ==
    pub fn count_limit(&self) -> usize {
        self.shared.state.lock().count_limit
    }

    /// Changes the entry count limit (0 = unlimited), evicting immediately if
    /// the store is now over it.
    pub fn set_count_limit(&self, limit: usize) {
        let evicted = {
            let mut state = self.shared.state.lock();
            state.count_limit = limit;
            state.enforce_limits()
        };
        info!(store = %self.shared.name, limit, evicted, "Count limit changed");
    }

    pub fn total_cost_limit(&self) -> u64 {
        self.shared.state.lock().total_cost_limit
    }

    /// Changes the aggregate cost limit (0 = unlimited), evicting immediately
    /// if the store is now over it.
    pub fn set_total_cost_limit(&self, limit: u64) {
        let evicted = {
            let mut state = self.shared.state.lock();
            state.total_cost_limit = limit;
            state.enforce_limits()
        };
        info!(store = %self.shared.name, limit, evicted, "Total cost limit changed");
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_cost(&self) -> u64 {
        self.shared.state.lock().total_cost
    }

    // == Stats ==
    /// Returns a snapshot of the store counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.total_entries = state.entries.len();
        stats.total_cost = state.total_cost;
        stats
    }
}

impl<K, V> std::fmt::Debug for BoundedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStore")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> String {
        format!("key{}", n)
    }

    #[test]
    fn test_store_new() {
        let store: BoundedStore<String, String> = BoundedStore::new(100, 0);
        assert!(store.is_empty());
        assert_eq!(store.count_limit(), 100);
        assert_eq!(store.total_cost_limit(), 0);
        assert_eq!(store.name(), "bounded_store");
    }

    #[test]
    fn test_store_set_and_get() {
        let store = BoundedStore::new(100, 0);
        store.set(key(1), "value1".to_string());

        assert_eq!(store.get(&key(1)), Some("value1".to_string()));
        assert_eq!(store.get(&key(2)), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_replaces_cost() {
        let store = BoundedStore::new(0, 0);
        store.set_with_cost(key(1), 1, 10);
        store.set_with_cost(key(1), 2, 3);

        assert_eq!(store.get(&key(1)), Some(2));
        assert_eq!(store.total_cost(), 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_remove() {
        let store = BoundedStore::new(100, 0);
        store.set_with_cost(key(1), 1, 4);

        assert_eq!(store.remove(&key(1)), Some(1));
        assert_eq!(store.remove(&key(1)), None);
        assert!(store.is_empty());
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_store_remove_all() {
        let store = BoundedStore::new(100, 0);
        store.set(key(1), 1);
        store.set(key(2), 2);
        store.remove_all();

        assert!(store.is_empty());
        assert_eq!(store.get(&key(1)), None);
        assert_eq!(store.stats().purges, 0);
    }

    #[test]
    fn test_store_count_limit_evicts_lru() {
        let store = BoundedStore::new(3, 0);
        store.set(key(1), 1);
        store.set(key(2), 2);
        store.set(key(3), 3);

        // key1 becomes most recently used, key2 is now the oldest
        store.get(&key(1));
        store.set(key(4), 4);

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&key(2)), None);
        assert!(store.get(&key(1)).is_some());
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_cost_limit_evicts() {
        let store = BoundedStore::new(0, 10);
        store.set_with_cost(key(1), 1, 4);
        store.set_with_cost(key(2), 2, 4);
        store.set_with_cost(key(3), 3, 4);

        assert!(store.total_cost() <= 10);
        assert_eq!(store.get(&key(1)), None);
        assert_eq!(store.get(&key(3)), Some(3));
    }

    #[test]
    fn test_store_oversized_item_is_dropped() {
        let store = BoundedStore::new(0, 10);
        store.set_with_cost(key(1), 1, 11);

        assert!(store.is_empty());
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_store_lowering_limit_evicts() {
        let store = BoundedStore::new(0, 0);
        for n in 0..10 {
            store.set(key(n), n);
        }

        store.set_count_limit(4);
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(&key(9)), Some(9));

        store.set_count_limit(0);
        store.set(key(20), 20);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_store_default_cost_ignores_cost_limit() {
        let store = BoundedStore::new(0, 1);
        for n in 0..5 {
            store.set(key(n), n);
        }
        assert_eq!(store.len(), 5);
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_store_purge_all() {
        let store = BoundedStore::new(100, 0);
        store.set(key(1), 1);
        store.purge_all();

        assert!(store.is_empty());
        assert_eq!(store.stats().purges, 1);
    }

    #[test]
    fn test_store_memory_pressure_registration() {
        let pressure = MemoryPressure::new();
        let config = Config::default();
        let store = BoundedStore::from_config(&config, Some(&pressure));
        store.set(key(1), 1);

        assert_eq!(pressure.observer_count(), 1);
        assert_eq!(pressure.notify(), 1);
        assert!(store.is_empty());

        drop(store);
        assert_eq!(pressure.observer_count(), 0);
    }

    #[test]
    fn test_store_stats() {
        let store = BoundedStore::new(100, 0);
        store.set_with_cost(key(1), 1, 2);
        store.get(&key(1));
        store.get(&key(2));

        let stats = store.stats();
        assert_eq!(stats.hits, 0, "raw lookups are not counted");
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_cost, 2);
    }

    #[test]
    fn test_store_concurrent_writers() {
        let store = Arc::new(BoundedStore::new(0, 0));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        store.set(key(t * 100 + n), n);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 800);
    }
}
