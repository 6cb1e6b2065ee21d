//! Nutrilog Cache - Keyed fetch-through cache
//!
//! An in-memory store of server-derived values addressed by hierarchical
//! [`CacheKey`](nutrilog_core::CacheKey)s.
//!
//! # Design
//!
//! - **Point reads and writes**: `get`/`set` touch exactly one key, never its
//!   siblings.
//! - **Scoped invalidation**: `invalidate(prefix)` marks every entry below a
//!   prefix stale. Stale entries keep their value (rollback snapshots and
//!   debugging still see it) but are never served to readers.
//! - **Fetch-through with coalescing**: a miss runs the caller's fetch and
//!   stores the result. Concurrent misses on the same key join one shared
//!   fetch instead of issuing their own.
//! - **Optimistic mutation primitives**: snapshot + speculative write,
//!   commit, and rollback each happen under a single lock acquisition, so no
//!   reader ever observes a half-applied mutation.
//!
//! The cache is a cheaply cloneable handle. Build it once and pass clones to
//! every consumer.
//!
//! # Example
//!
//! ```ignore
//! let cache = KeyedCache::with_defaults();
//! let read = cache
//!     .fetch_through(&keys::active_target(), Freshness::default(), || fetch_target())
//!     .await?;
//! if read.was_cache_miss() {
//!     tracing::debug!("target loaded from the API");
//! }
//! ```

pub mod config;
pub mod entry;
pub mod freshness;
pub mod keyed;
pub mod ledger;
pub mod stats;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use freshness::{CacheRead, Freshness};
pub use keyed::KeyedCache;
pub use ledger::{MutationState, MutationTicket};
pub use stats::CacheStats;
