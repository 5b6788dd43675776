//! Caching strategies applied per bucket

use std::time::Duration;

/// Default NetworkFirst race window
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

/// How a bucket answers a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve fresh cache hits without touching the network
    CacheFirst,
    /// Race the network against `timeout`, fall back to cache
    NetworkFirst { timeout: Duration },
    /// Serve cache immediately, refresh it in the background
    StaleWhileRevalidate,
    /// Never read or write the cache
    NetworkOnly,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::network_first()
    }
}

impl Strategy {
    /// NetworkFirst with the default timeout
    #[must_use]
    pub fn network_first() -> Self {
        Strategy::NetworkFirst {
            timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }

    /// Short label used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst { .. } => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkOnly => "network-only",
        }
    }

    /// Validate strategy configuration
    ///
    /// # Errors
    ///
    /// Returns error if a NetworkFirst timeout is zero (it would never reach the network)
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Strategy::NetworkFirst { timeout } if timeout.is_zero() => Err(
                crate::Error::InvalidCacheStrategy("network-first timeout must be greater than 0".into()),
            ),
            _ => Ok(()),
        }
    }
}
