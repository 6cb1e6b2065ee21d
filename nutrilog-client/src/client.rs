//! The sync service: one transport, one session, one cache.

use nutrilog_cache::{CacheConfig, KeyedCache};
use nutrilog_core::Transport;
use std::sync::Arc;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fetch::RestClient;
use crate::mutation::MutationEngine;
use crate::refresh::RefreshCoordinator;
use crate::resources::{DailySummaries, MealItems, Targets};
use crate::transport::HttpTransport;

/// Entry point for UI code. Build one per signed-in session and share it;
/// clones share the same cache and refresh slot.
#[derive(Debug, Clone)]
pub struct SyncClient {
    rest: RestClient,
    cache: KeyedCache,
    mutations: MutationEngine,
}

impl SyncClient {
    /// Build a client that talks HTTP to `config.api_base_url`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        info!(api_base_url = %config.api_base_url, "sync client configured");
        Ok(Self::with_transport(
            Arc::new(transport),
            config.refresh_path.clone(),
            config.to_cache_config(),
        ))
    }

    /// Build a client over any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        refresh_path: impl Into<String>,
        cache_config: CacheConfig,
    ) -> Self {
        let refresh = RefreshCoordinator::new(Arc::clone(&transport), refresh_path);
        let rest = RestClient::new(transport, refresh);
        let cache = KeyedCache::new(cache_config);
        let mutations = MutationEngine::new(cache.clone());
        Self {
            rest,
            cache,
            mutations,
        }
    }

    pub fn meal_items(&self) -> MealItems<'_> {
        MealItems::new(self)
    }

    pub fn targets(&self) -> Targets<'_> {
        Targets::new(self)
    }

    pub fn summaries(&self) -> DailySummaries<'_> {
        DailySummaries::new(self)
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn cache(&self) -> &KeyedCache {
        &self.cache
    }

    pub fn mutations(&self) -> &MutationEngine {
        &self.mutations
    }

    /// Refresh the session if no refresh is already running, and report
    /// whether it succeeded.
    pub async fn ensure_refreshed(&self) -> bool {
        self.rest.refresh().ensure_refreshed().await
    }
}
