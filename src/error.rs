//! Error types
//!
//! Cache lookups never fail: absence and expiry are reported as `None`. The
//! only errors in the crate come from loading configuration.

use thiserror::Error;

// == Cache Error Enum ==
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// An environment variable was set to a value that does not parse
    #[error("Invalid value {value:?} for {var}")]
    InvalidConfig { var: String, value: String },
}

// == Result Type Alias ==
pub type Result<T> = std::result::Result<T, CacheError>;
