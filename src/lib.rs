//! Memo Cache - an in-process memoizing cache
//!
//! Compute once, reuse until stale: deadline-based expiry, bump renewal on
//! access, and a count/cost bounded store that can be purged on memory
//! pressure.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Deadline, MemoCache, MemoryPressure, PreviousItem};
pub use config::Config;
pub use tasks::spawn_pressure_relay;
