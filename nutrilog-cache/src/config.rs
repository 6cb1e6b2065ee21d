//! Cache configuration.

use std::time::Duration;

use crate::freshness::Freshness;

/// Configuration for the keyed cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Freshness applied by `get` and by fetch-through reads that do not
    /// specify their own.
    pub default_freshness: Freshness,
    /// Maximum number of entries before the oldest unpinned entry is dropped.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_freshness: Freshness::UntilInvalidated,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve entries only while they are younger than `max_staleness`.
    pub fn with_max_staleness(mut self, max_staleness: Duration) -> Self {
        self.default_freshness = Freshness::bounded(max_staleness);
        self
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.default_freshness = freshness;
        self
    }

    /// Set the max number of entries (clamped to at least one).
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_max_staleness(Duration::from_secs(120))
            .with_max_entries(5000);

        assert_eq!(
            config.default_freshness,
            Freshness::Bounded {
                max_staleness: Duration::from_secs(120)
            }
        );
        assert_eq!(config.max_entries, 5000);
    }

    #[test]
    fn test_max_entries_never_zero() {
        assert_eq!(CacheConfig::new().with_max_entries(0).max_entries, 1);
    }

    #[test]
    fn test_default_serves_until_invalidated() {
        assert!(CacheConfig::default().default_freshness.is_until_invalidated());
    }
}
