//! Cache Module
//!
//! Deadline policies, cache entries, the bounded backing store and the
//! memoizing cache built on top of them.

mod deadline;
mod entry;
mod lru;
mod memo;
mod pressure;
mod stats;
mod store;


// Re-export public types
pub use deadline::Deadline;
pub use entry::{Entry, PreviousItem};
pub use lru::LruTracker;
pub use memo::MemoCache;
pub use pressure::{MemoryPressure, Purge, Subscription};
pub use stats::{CacheStats, LookupCounter};
pub use store::{BoundedStore, DEFAULT_COST};
