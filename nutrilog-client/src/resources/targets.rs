//! The active nutrition target.

use nutrilog_core::{keys, ApiResult, ApiResultExt, NutritionTarget, TargetInput};
use tracing::info;

use crate::client::SyncClient;
use crate::mutation::{typed_update, MutationPlan};

const ACTIVE_PATH: &str = "/api/targets/active";

/// Outcome of [`Targets::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum TargetWrite {
    /// The server stored the target.
    Saved(NutritionTarget),
    /// The server reported a conflicting concurrent change; the cached target
    /// was dropped and refetched instead.
    Resynced(Option<NutritionTarget>),
}

impl TargetWrite {
    /// The target as the server now has it.
    pub fn target(&self) -> Option<&NutritionTarget> {
        match self {
            Self::Saved(target) => Some(target),
            Self::Resynced(target) => target.as_ref(),
        }
    }
}

/// Target operations bound to a [`SyncClient`].
#[derive(Debug, Clone, Copy)]
pub struct Targets<'a> {
    client: &'a SyncClient,
}

impl<'a> Targets<'a> {
    pub(crate) fn new(client: &'a SyncClient) -> Self {
        Self { client }
    }

    /// The active target, or `None` if the user has not set one (404).
    /// An absent target is cached like any other value.
    pub async fn active(&self) -> ApiResult<Option<NutritionTarget>> {
        let rest = self.client.rest().clone();
        let read = self
            .client
            .cache()
            .fetch_through(
                &keys::active_target(),
                self.client.cache().config().default_freshness.clone(),
                move || async move {
                    rest.get_json::<NutritionTarget>(ACTIVE_PATH)
                        .await
                        .not_found_as_none()
                },
            )
            .await?;
        Ok(read.into_value())
    }

    /// Create or replace the active target.
    ///
    /// The new values show up in the cached target at once. A 409 is not an
    /// error: the speculative write is rolled back and the target is
    /// refetched.
    pub async fn upsert(&self, input: &TargetInput) -> ApiResult<TargetWrite> {
        let result = self
            .client
            .mutations()
            .run_optimistic(
                MutationPlan::new(keys::active_target()),
                typed_update(|current: Option<Option<NutritionTarget>>| {
                    let existing = current.flatten();
                    Some(Some(NutritionTarget::pending(input, existing.as_ref())))
                }),
                || self.client.rest().put_json::<NutritionTarget, _>(ACTIVE_PATH, input),
            )
            .await;

        match result {
            Ok(target) => Ok(TargetWrite::Saved(target)),
            Err(err) if err.is_conflict() => {
                info!(code = ?err.code(), "target changed on the server, resyncing");
                self.client.cache().invalidate(&keys::targets());
                self.active().await.map(TargetWrite::Resynced)
            }
            Err(err) => Err(err),
        }
    }
}
