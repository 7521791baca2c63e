//! Memory Pressure Module
//!
//! Observer registry for low-memory notifications. Bounded stores register at
//! construction and are dropped from the registry together with their
//! [`Subscription`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

// == Purge Target ==
/// Something that can drop all of its contents on request.
pub trait Purge: Send + Sync {
    fn purge_all(&self);
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    targets: HashMap<u64, Weak<dyn Purge>>,
}

// == Memory Pressure ==
/// A low-memory signal shared between a host environment and any number of
/// caches. Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct MemoryPressure {
    observers: Arc<Mutex<Observers>>,
}

impl MemoryPressure {
    pub fn new() -> Self {
        Self::default()
    }

    // == Subscribe ==
    /// Registers `target` until the returned subscription is dropped.
    pub fn subscribe(&self, target: Weak<dyn Purge>) -> Subscription {
        let mut observers = self.observers.lock();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.targets.insert(id, target);

        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    // == Notify ==
    /// Purges every registered target. Returns how many were purged.
    pub fn notify(&self) -> usize {
        // Upgrade under the lock, purge outside it so targets may unsubscribe.
        let targets: Vec<Arc<dyn Purge>> = self
            .observers
            .lock()
            .targets
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        for target in &targets {
            target.purge_all();
        }

        debug!(observers = targets.len(), "Memory pressure delivered");
        targets.len()
    }

    /// Number of live registrations.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().targets.len()
    }
}

// == Subscription ==
/// Registration handle; dropping it deregisters the observer.
pub struct Subscription {
    id: u64,
    observers: Weak<Mutex<Observers>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.lock().targets.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Purge for Counter {
        fn purge_all(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_reaches_all_observers() {
        let pressure = MemoryPressure::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());

        let a_dyn: Arc<dyn Purge> = a.clone();
        let b_dyn: Arc<dyn Purge> = b.clone();
        let _sa = pressure.subscribe(Arc::downgrade(&a_dyn));
        let _sb = pressure.subscribe(Arc::downgrade(&b_dyn));

        assert_eq!(pressure.notify(), 2);
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_subscription_deregisters() {
        let pressure = MemoryPressure::new();
        let counter = Arc::new(Counter::default());
        let target: Arc<dyn Purge> = counter.clone();

        let subscription = pressure.subscribe(Arc::downgrade(&target));
        assert_eq!(pressure.observer_count(), 1);

        drop(subscription);
        assert_eq!(pressure.observer_count(), 0);
        assert_eq!(pressure.notify(), 0);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dead_target_is_skipped() {
        let pressure = MemoryPressure::new();
        let target: Arc<dyn Purge> = Arc::new(Counter::default());
        let _subscription = pressure.subscribe(Arc::downgrade(&target));

        drop(target);
        assert_eq!(pressure.notify(), 0);
    }

    #[test]
    fn test_subscription_outliving_signal() {
        let pressure = MemoryPressure::new();
        let target: Arc<dyn Purge> = Arc::new(Counter::default());
        let subscription = pressure.subscribe(Arc::downgrade(&target));

        drop(pressure);
        drop(subscription);
    }
}
