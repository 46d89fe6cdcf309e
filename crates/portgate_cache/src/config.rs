//! Expiry settings for the client registry.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the client registry's backing store.
///
/// Expiry is opt-in: with no `std_ttl_secs` a client handle stays bound to its
/// port until it is overwritten.
///
/// # Example
///
/// ```toml
/// [cache]
/// std_ttl_secs = 10800
/// check_period_secs = 1200
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct ClientCacheConfig {
    /// Default TTL for cached entries (seconds), `None` keeps entries forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    std_ttl_secs: Option<u64>,

    /// How often the background sweeper purges expired entries (seconds), 0 disables it
    #[serde(default = "default_check_period")]
    check_period_secs: u64,
}

fn default_check_period() -> u64 {
    1200
}

impl Default for ClientCacheConfig {
    fn default() -> Self {
        Self {
            std_ttl_secs: None,
            check_period_secs: default_check_period(),
        }
    }
}

impl ClientCacheConfig {
    /// Default TTL as a duration.
    pub fn std_ttl(&self) -> Option<Duration> {
        self.std_ttl_secs.map(Duration::from_secs)
    }

    /// Sweeper interval, `None` when sweeping is disabled.
    pub fn check_period(&self) -> Option<Duration> {
        (self.check_period_secs > 0).then(|| Duration::from_secs(self.check_period_secs))
    }
}
