//! Cache statistics.

/// Counters describing cache activity since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fetch-through reads served from cache.
    pub hits: u64,
    /// Fetch-through reads that needed the API.
    pub misses: u64,
    /// Misses that joined a fetch already in flight.
    pub coalesced: u64,
    /// Entries marked stale by invalidation.
    pub invalidations: u64,
    /// Fetch results dropped because a mutation or invalidation detached them.
    pub discarded_fetches: u64,
    /// Entries dropped to stay under `max_entries`.
    pub evictions: u64,
    pub commits: u64,
    pub rollbacks: u64,
    /// Failed mutations whose rollback was skipped because a newer mutation owned the key.
    pub superseded: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
