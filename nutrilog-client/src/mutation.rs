//! Optimistic mutations over the keyed cache.
//!
//! A mutation moves through `Pending -> Committed | RolledBack | Superseded`:
//!
//! 1. **Pending**: in-flight fetches under the mutation's key are detached,
//!    the rollback key is snapshotted, and the speculative value is written,
//!    all before the network call starts.
//! 2. **Committed**: the server accepted the write. The key and its
//!    dependents are invalidated so the next read fetches server truth.
//! 3. **RolledBack**: the server rejected the write. The snapshot is put back
//!    exactly and nothing is invalidated. The caller gets the error unchanged.
//! 4. **Superseded**: rejected, but a newer mutation owns the key. The
//!    snapshot is dropped and the key is reconciled by refetch instead.
//!
//! Mutation ids are issued by the cache, so they increase monotonically
//! across every engine sharing it.

use nutrilog_cache::{CacheEntry, KeyedCache, MutationState, MutationTicket};
use nutrilog_core::{ApiResult, CacheKey};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, info, warn};

/// What a mutation touches in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationPlan {
    /// Scope whose in-flight fetches are detached on begin and which is
    /// invalidated (as a prefix) on commit.
    pub key: CacheKey,
    /// Exact entry that is snapshotted, written speculatively, and restored.
    pub rollback_key: CacheKey,
    /// Keys derived server-side from `key`, invalidated on commit.
    pub dependents: Vec<CacheKey>,
}

impl MutationPlan {
    /// A plan whose rollback key is `key` itself.
    pub fn new(key: CacheKey) -> Self {
        Self {
            rollback_key: key.clone(),
            key,
            dependents: Vec::new(),
        }
    }

    pub fn with_rollback_key(mut self, rollback_key: CacheKey) -> Self {
        self.rollback_key = rollback_key;
        self
    }

    pub fn with_dependent(mut self, dependent: CacheKey) -> Self {
        self.dependents.push(dependent);
        self
    }
}

/// Runs optimistic mutations against a shared cache.
#[derive(Debug, Clone)]
pub struct MutationEngine {
    cache: KeyedCache,
}

impl MutationEngine {
    pub fn new(cache: KeyedCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &KeyedCache {
        &self.cache
    }

    /// Enter the pending state: snapshot `plan.rollback_key` and apply
    /// `optimistic` to it in one step.
    ///
    /// `optimistic` receives the current value, or `None` if the key is not
    /// cached, and returns the speculative value or `None` to leave the entry
    /// untouched.
    pub fn begin<U>(&self, plan: MutationPlan, optimistic: U) -> MutationContext
    where
        U: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let ticket = self
            .cache
            .begin_mutation(&plan.key, &plan.rollback_key, optimistic);
        debug!(
            mutation_id = ticket.id(),
            key = %plan.key,
            applied = ticket.applied(),
            "optimistic mutation started"
        );
        MutationContext {
            id: ticket.id(),
            cache: self.cache.clone(),
            plan,
            ticket: Some(ticket),
            state: MutationState::Pending,
        }
    }

    /// Apply `optimistic`, run `mutate`, then commit or roll back.
    ///
    /// The result of `mutate` is returned as-is; on failure the cache has
    /// already been restored when the error reaches the caller.
    pub async fn run_optimistic<T, U, F, Fut>(
        &self,
        plan: MutationPlan,
        optimistic: U,
        mutate: F,
    ) -> ApiResult<T>
    where
        U: FnOnce(Option<&Value>) -> Option<Value>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut context = self.begin(plan, optimistic);
        match mutate().await {
            Ok(value) => {
                context.commit();
                Ok(value)
            }
            Err(err) => {
                context.roll_back();
                Err(err)
            }
        }
    }
}

/// A mutation between its speculative write and its settlement.
///
/// Dropping a context that is still pending rolls it back, so a cancelled
/// mutation future leaves no speculative value behind.
#[derive(Debug)]
pub struct MutationContext {
    id: u64,
    cache: KeyedCache,
    plan: MutationPlan,
    /// Present until the mutation settles.
    ticket: Option<MutationTicket>,
    state: MutationState,
}

impl MutationContext {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    pub fn plan(&self) -> &MutationPlan {
        &self.plan
    }

    /// Snapshot of the rollback key taken when the mutation began.
    pub fn snapshot(&self) -> Option<&CacheEntry> {
        self.ticket.as_ref().and_then(MutationTicket::snapshot)
    }

    /// Settle as accepted. No-op once settled.
    pub fn commit(&mut self) -> MutationState {
        let Some(ticket) = self.ticket.take() else {
            return self.state;
        };
        self.state = self.cache.commit_mutation(
            ticket,
            &self.plan.key,
            &self.plan.rollback_key,
            &self.plan.dependents,
        );
        info!(mutation_id = self.id, key = %self.plan.key, "mutation committed");
        self.state
    }

    /// Settle as rejected. No-op once settled.
    pub fn roll_back(&mut self) -> MutationState {
        let Some(ticket) = self.ticket.take() else {
            return self.state;
        };
        self.state = self
            .cache
            .rollback_mutation(ticket, &self.plan.key, &self.plan.rollback_key);
        match self.state {
            MutationState::Superseded => warn!(
                mutation_id = self.id,
                key = %self.plan.rollback_key,
                "mutation failed after a newer write, leaving key for refetch"
            ),
            _ => warn!(
                mutation_id = self.id,
                key = %self.plan.rollback_key,
                "mutation rolled back"
            ),
        }
        self.state
    }
}

impl Drop for MutationContext {
    fn drop(&mut self) {
        if self.state == MutationState::Pending {
            debug!(mutation_id = self.id, "mutation dropped before settling");
            self.roll_back();
        }
    }
}

/// Lift a typed update into the JSON-level update [`MutationEngine::begin`]
/// takes. If the cached value does not decode as `T` or the result does not
/// encode, the speculative write is skipped.
pub fn typed_update<T, F>(update: F) -> impl FnOnce(Option<&Value>) -> Option<Value>
where
    T: DeserializeOwned + Serialize,
    F: FnOnce(Option<T>) -> Option<T>,
{
    move |current| {
        let current = match current.map(|value| serde_json::from_value::<T>(value.clone())) {
            None => None,
            Some(Ok(decoded)) => Some(decoded),
            Some(Err(err)) => {
                warn!(error = %err, "cached value has unexpected shape, skipping optimistic write");
                return None;
            }
        };
        let updated = update(current)?;
        serde_json::to_value(updated)
            .map_err(|err| warn!(error = %err, "optimistic value failed to encode"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::{cache_key, ApiError};
    use serde_json::json;

    fn seeded() -> (MutationEngine, CacheKey) {
        let cache = KeyedCache::with_defaults();
        let key = cache_key!["meal-items", "by-date", "2024-06-01"];
        cache.set_value(key.clone(), json!(["meal-1", "meal-2"]));
        (MutationEngine::new(cache), key)
    }

    #[tokio::test]
    async fn test_failure_restores_snapshot() {
        let (engine, key) = seeded();
        let before = engine.cache().peek(&key);

        let result: ApiResult<()> = engine
            .run_optimistic(
                MutationPlan::new(key.clone()),
                |_| Some(json!(["meal-1"])),
                || async { Err(ApiError::network("offline")) },
            )
            .await;

        assert_eq!(result.unwrap_err(), ApiError::network("offline"));
        assert_eq!(engine.cache().peek(&key), before);
        assert_eq!(engine.cache().stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_success_invalidates_key_and_dependents() {
        let (engine, key) = seeded();
        let summary = cache_key!["daily-summary", "2024-06-01"];
        engine.cache().set_value(summary.clone(), json!({}));

        engine
            .run_optimistic(
                MutationPlan::new(key.clone()).with_dependent(summary.clone()),
                |_| Some(json!(["meal-1"])),
                || async { Ok(()) },
            )
            .await
            .unwrap();

        assert!(engine.cache().get(&key).is_none());
        assert!(engine.cache().get(&summary).is_none());
    }

    #[test]
    fn test_speculative_value_is_visible_while_pending() {
        let (engine, key) = seeded();
        let context = engine.begin(MutationPlan::new(key.clone()), |_| Some(json!(["meal-1"])));

        assert_eq!(context.state(), MutationState::Pending);
        assert_eq!(engine.cache().get(&key).unwrap().value(), &json!(["meal-1"]));
        assert_eq!(context.snapshot().unwrap().value(), &json!(["meal-1", "meal-2"]));
    }

    #[test]
    fn test_dropped_context_rolls_back() {
        let (engine, key) = seeded();
        {
            let _context = engine.begin(MutationPlan::new(key.clone()), |_| Some(json!([])));
            assert_eq!(engine.cache().get(&key).unwrap().value(), &json!([]));
        }
        assert_eq!(engine.cache().get(&key).unwrap().value(), &json!(["meal-1", "meal-2"]));
        assert_eq!(engine.cache().pending_mutations(&key), 0);
    }

    #[test]
    fn test_settle_is_idempotent() {
        let (engine, key) = seeded();
        let mut context = engine.begin(MutationPlan::new(key), |_| None);
        assert_eq!(context.commit(), MutationState::Committed);
        assert_eq!(context.roll_back(), MutationState::Committed);
        assert_eq!(engine.cache().stats().commits, 1);
    }

    #[test]
    fn test_mutation_ids_increase_across_engines() {
        let (engine, key) = seeded();
        let other = MutationEngine::new(engine.cache().clone());
        let mut first = engine.begin(MutationPlan::new(key.clone()), |_| Some(json!(["meal-1"])));
        let mut second = other.begin(MutationPlan::new(key.clone()), |_| Some(json!([])));
        assert!(second.id() > first.id());

        // The second engine's write is newer, so the first failure must not undo it.
        assert_eq!(first.roll_back(), MutationState::Superseded);
        assert_eq!(engine.cache().get(&key).unwrap().value(), &json!([]));
        second.commit();
    }

    #[test]
    fn test_typed_update_skips_on_shape_mismatch() {
        let update = typed_update::<Vec<u32>, _>(|items| {
            let mut items = items.unwrap_or_default();
            items.push(1);
            Some(items)
        });
        assert_eq!(update(Some(&json!({"not": "a list"}))), None);

        let update = typed_update::<Vec<u32>, _>(|items| {
            let mut items = items.unwrap_or_default();
            items.push(1);
            Some(items)
        });
        assert_eq!(update(Some(&json!([0]))), Some(json!([0, 1])));
    }
}
