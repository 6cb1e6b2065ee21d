//! Freshness contracts for cache reads.
//!
//! Callers state how much staleness they tolerate, and reads return
//! [`CacheRead<T>`] which says where the value came from and how old it is.

use chrono::Utc;
use nutrilog_core::Timestamp;
use std::time::Duration;

use crate::entry::CacheEntry;

/// Freshness requirement for cache reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Serve any entry that has not been invalidated, however old.
    ///
    /// Invalidation after every confirmed write is what keeps these entries
    /// honest, so this is the default.
    #[default]
    UntilInvalidated,

    /// Serve non-invalidated entries only while they are younger than
    /// `max_staleness`; older entries are refetched.
    Bounded {
        /// Maximum acceptable age of a cached value.
        max_staleness: Duration,
    },
}

impl Freshness {
    pub fn bounded(max_staleness: Duration) -> Self {
        Self::Bounded { max_staleness }
    }

    pub fn is_until_invalidated(&self) -> bool {
        matches!(self, Self::UntilInvalidated)
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::Bounded { .. })
    }

    /// Whether `entry` may be served under this requirement.
    pub fn admits(&self, entry: &CacheEntry) -> bool {
        if entry.is_stale() {
            return false;
        }
        match self {
            Self::UntilInvalidated => true,
            Self::Bounded { max_staleness } => entry.age() <= *max_staleness,
        }
    }
}

/// Result of a fetch-through read, carrying where the value came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: Timestamp,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A read served from a cached entry.
    pub fn from_cache(value: T, fetched_at: Timestamp) -> Self {
        Self {
            value,
            fetched_at,
            was_cache_hit: true,
        }
    }

    /// A read that went to the API (directly or by joining another caller's fetch).
    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Time since the value was fetched.
    pub fn staleness(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
