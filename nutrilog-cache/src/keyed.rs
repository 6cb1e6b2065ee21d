//! Keyed cache with fetch-through reads and optimistic mutation support.
//!
//! All state sits behind one mutex that is only ever held for synchronous
//! bookkeeping, never across an `.await`. Each public operation is a single
//! critical section, which is what makes snapshot + speculative write, commit,
//! and rollback atomic with respect to readers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use nutrilog_core::{ApiResult, CacheKey};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::freshness::{CacheRead, Freshness};
use crate::ledger::{MutationLedger, MutationState, MutationTicket};
use crate::stats::CacheStats;

type SharedFetch = Shared<BoxFuture<'static, ApiResult<Value>>>;

/// A fetch currently running for one key. `generation` identifies it so a
/// fetch that was detached (by a mutation or invalidation) cannot store its
/// result when it finally arrives.
struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    ledgers: HashMap<CacheKey, MutationLedger>,
    next_generation: u64,
    next_mutation_id: u64,
    stats: CacheStats,
}

impl CacheState {
    fn insert(&mut self, key: CacheKey, value: Value, max_entries: usize) {
        let entry = CacheEntry::new(key.clone(), value, Utc::now());
        self.insert_entry(key, entry, max_entries);
    }

    fn insert_entry(&mut self, key: CacheKey, entry: CacheEntry, max_entries: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= max_entries {
            self.evict_oldest(&key);
        }
        self.entries.insert(key, entry);
    }

    /// Drop the entry with the oldest `fetched_at`, skipping `keep` and any
    /// key with a mutation still pending (its rollback needs the slot).
    fn evict_oldest(&mut self, keep: &CacheKey) {
        let victim = self
            .entries
            .values()
            .filter(|entry| entry.key() != keep && !self.ledgers.contains_key(entry.key()))
            .min_by_key(|entry| entry.fetched_at())
            .map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            debug!(key = %victim, "evicting cache entry");
            self.entries.remove(&victim);
            self.stats.evictions += 1;
        }
    }

    /// Mark every entry under `prefix` stale and detach fetches under it.
    fn invalidate(&mut self, prefix: &CacheKey) -> usize {
        let mut marked = 0;
        for entry in self.entries.values_mut() {
            if entry.key().starts_with(prefix) && entry.mark_stale() {
                marked += 1;
            }
        }
        self.detach_fetches(prefix);
        self.stats.invalidations += marked as u64;
        marked
    }

    /// Forget fetches under `prefix`. Callers already awaiting them still get
    /// their result; it is just never written back.
    fn detach_fetches(&mut self, prefix: &CacheKey) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|key, _| !key.starts_with(prefix));
        before - self.in_flight.len()
    }

    fn settle_fetch(&mut self, key: &CacheKey, generation: u64, result: &ApiResult<Value>, max_entries: usize) {
        let still_attached = self
            .in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation);
        if !still_attached {
            debug!(key = %key, "discarding detached fetch result");
            self.stats.discarded_fetches += 1;
            return;
        }
        self.in_flight.remove(key);
        if let Ok(value) = result {
            self.insert(key.clone(), value.clone(), max_entries);
        }
    }

    fn restore(&mut self, key: &CacheKey, snapshot: Option<CacheEntry>, max_entries: usize) {
        match snapshot {
            Some(entry) => self.insert_entry(key.clone(), entry, max_entries),
            None => {
                self.entries.remove(key);
            }
        }
    }
}

/// In-memory cache of server-derived values keyed by [`CacheKey`].
///
/// Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct KeyedCache {
    state: Arc<Mutex<CacheState>>,
    config: CacheConfig,
}

impl KeyedCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ========================================================================
    // POINT OPERATIONS
    // ========================================================================

    /// The entry for `key` if present and servable under the default freshness.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| self.config.default_freshness.admits(entry))
            .cloned()
    }

    /// Typed variant of [`get`](Self::get).
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> ApiResult<Option<T>> {
        self.get(key).map(|entry| entry.decode()).transpose()
    }

    /// The entry for `key` even if it has been invalidated.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Insert or overwrite exactly `key`. Sibling and child keys are untouched.
    pub fn set_value(&self, key: CacheKey, value: Value) {
        let mut state = self.state.lock();
        state.insert(key, value, self.config.max_entries);
    }

    pub fn set<T: Serialize>(&self, key: CacheKey, value: &T) -> ApiResult<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value);
        Ok(())
    }

    /// Mark every entry whose key starts with `prefix` stale. Returns how
    /// many entries went from fresh to stale.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        let marked = self.state.lock().invalidate(prefix);
        debug!(prefix = %prefix, marked, "invalidated cache scope");
        marked
    }

    /// Drop every entry and detach every fetch. Pending mutations keep their
    /// ledgers so their settlement still works.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.in_flight.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a fetch for exactly `key` is in flight and attached.
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.state.lock().in_flight.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.entry_count = state.entries.len() as u64;
        stats
    }

    // ========================================================================
    // FETCH-THROUGH
    // ========================================================================

    /// Read `key`, running `fetch` on a miss and storing its result.
    ///
    /// A miss while another fetch for the same key is in flight joins that
    /// fetch; `fetch` is then never called. Fetch errors are returned to every
    /// joined caller and nothing is stored. `fetch` runs without the cache
    /// lock held.
    pub async fn fetch_through<T, F, Fut>(
        &self,
        key: &CacheKey,
        freshness: Freshness,
        fetch: F,
    ) -> ApiResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let joined = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Some(entry) = state.entries.get(key).filter(|entry| freshness.admits(entry)) {
                let read = CacheRead::from_cache(entry.decode::<T>()?, entry.fetched_at());
                state.stats.hits += 1;
                trace!(key = %key, "cache hit");
                return Ok(read);
            }
            state.stats.misses += 1;
            state.in_flight.get(key).map(|flight| flight.fetch.clone())
        };
        if let Some(pending) = joined {
            self.state.lock().stats.coalesced += 1;
            debug!(key = %key, "joining in-flight fetch");
            let value = pending.await?;
            return Ok(CacheRead::from_fetch(serde_json::from_value(value)?));
        }

        // Built outside the lock so `fetch` may itself use the cache. Another
        // caller can register a fetch for `key` in the meantime; ours is then
        // dropped unpolled and theirs is joined.
        let fetch = fetch();
        let pending = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Some(flight) = state.in_flight.get(key) {
                state.stats.coalesced += 1;
                debug!(key = %key, "joining in-flight fetch");
                flight.fetch.clone()
            } else {
                state.next_generation += 1;
                let generation = state.next_generation;
                let shared = self.spawn_fetch(key.clone(), generation, fetch);
                state.in_flight.insert(
                    key.clone(),
                    InFlight {
                        generation,
                        fetch: shared.clone(),
                    },
                );
                debug!(key = %key, generation, "cache miss, fetching");
                shared
            }
        };

        let value = pending.await?;
        Ok(CacheRead::from_fetch(serde_json::from_value(value)?))
    }

    /// Wrap a caller's fetch so that whichever joined caller drives it to
    /// completion also writes the result back.
    fn spawn_fetch<T, Fut>(&self, key: CacheKey, generation: u64, fetch: Fut) -> SharedFetch
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let max_entries = self.config.max_entries;
        async move {
            let result: ApiResult<Value> = match fetch.await {
                Ok(value) => serde_json::to_value(value).map_err(Into::into),
                Err(err) => Err(err),
            };
            state.lock().settle_fetch(&key, generation, &result, max_entries);
            result
        }
        .boxed()
        .shared()
    }

    // ========================================================================
    // OPTIMISTIC MUTATION PRIMITIVES
    // ========================================================================

    /// Start an optimistic mutation in one critical section:
    /// issue its id, detach fetches under `scope`, snapshot `key`, and apply
    /// `update` to the current value of `key`.
    ///
    /// `update` receives the current value (stale or not) and returns the
    /// speculative value, or `None` to leave the entry as it is. Only a
    /// mutation that wrote a value can own `key` against later failures.
    /// The returned ticket is handed back to settle the mutation.
    pub fn begin_mutation<F>(&self, scope: &CacheKey, key: &CacheKey, update: F) -> MutationTicket
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let mut state = self.state.lock();
        state.next_mutation_id += 1;
        let id = state.next_mutation_id;
        let detached = state.detach_fetches(scope);
        if detached > 0 {
            debug!(scope = %scope, detached, mutation_id = id, "superseded in-flight fetches");
        }

        let snapshot = state.entries.get(key).cloned();
        let speculative = update(snapshot.as_ref().map(CacheEntry::value));
        let applied = speculative.is_some();
        state.ledgers.entry(key.clone()).or_default().begin(id, applied);
        if let Some(value) = speculative {
            state.insert(key.clone(), value, self.config.max_entries);
        }
        MutationTicket {
            id,
            snapshot,
            applied,
        }
    }

    /// Settle a mutation the server accepted: invalidate `dependents`, and
    /// `scope` unless a newer mutation now owns `key` (that one invalidates
    /// when it settles).
    pub fn commit_mutation(
        &self,
        ticket: MutationTicket,
        scope: &CacheKey,
        key: &CacheKey,
        dependents: &[CacheKey],
    ) -> MutationState {
        let mut state = self.state.lock();
        let settlement = state
            .ledgers
            .entry(key.clone())
            .or_default()
            .commit(ticket.id, ticket.applied);
        if settlement.invalidate {
            state.invalidate(scope);
        }
        for dependent in dependents {
            state.invalidate(dependent);
        }
        if settlement.drained {
            state.ledgers.remove(key);
        }
        state.stats.commits += 1;
        settlement.state
    }

    /// Settle a mutation the server rejected: restore the ticket's snapshot
    /// under `key` if this mutation still owns the key. Nothing else is
    /// invalidated unless overlapping mutations left the key dirty.
    pub fn rollback_mutation(
        &self,
        ticket: MutationTicket,
        scope: &CacheKey,
        key: &CacheKey,
    ) -> MutationState {
        let mut state = self.state.lock();
        let settlement = state
            .ledgers
            .entry(key.clone())
            .or_default()
            .roll_back(ticket.id, ticket.applied);
        if settlement.restore {
            state.restore(key, ticket.snapshot, self.config.max_entries);
        }
        if settlement.invalidate {
            state.invalidate(scope);
        }
        if settlement.drained {
            state.ledgers.remove(key);
        }
        match settlement.state {
            MutationState::Superseded => state.stats.superseded += 1,
            _ => state.stats.rollbacks += 1,
        }
        settlement.state
    }

    /// Number of unsettled mutations on `key`.
    pub fn pending_mutations(&self, key: &CacheKey) -> usize {
        self.state
            .lock()
            .ledgers
            .get(key)
            .map(MutationLedger::pending)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for KeyedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("KeyedCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("pending_mutations", &state.ledgers.len())
            .field("config", &self.config)
            .finish()
    }
}
