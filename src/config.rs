//! Configuration Module
//!
//! Loads cache limits and naming from environment variables.

use std::env;
use std::str::FromStr;

use crate::error::{CacheError, Result};

/// Cache configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries, 0 = unlimited
    pub count_limit: usize,
    /// Maximum aggregate entry cost, 0 = unlimited
    pub total_cost_limit: u64,
    /// Name used in log output and for the renewal worker thread
    pub name: String,
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// # Environment Variables
    /// - `MEMO_COUNT_LIMIT` - Maximum cache entries (default: 0, unlimited)
    /// - `MEMO_TOTAL_COST_LIMIT` - Maximum aggregate cost (default: 0, unlimited)
    /// - `MEMO_CACHE_NAME` - Cache name (default: "memo_cache")
    ///
    /// Unset variables fall back to defaults; set but unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            count_limit: parse_var("MEMO_COUNT_LIMIT")?.unwrap_or(defaults.count_limit),
            total_cost_limit: parse_var("MEMO_TOTAL_COST_LIMIT")?
                .unwrap_or(defaults.total_cost_limit),
            name: env::var("MEMO_CACHE_NAME").unwrap_or(defaults.name),
        })
    }
}

fn parse_var<T: FromStr>(var: &str) -> Result<Option<T>> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::InvalidConfig {
                var: var.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            count_limit: 0,
            total_cost_limit: 0,
            name: "memo_cache".to_string(),
        }
    }
}
