//! Authenticated fetch: one transparent retry after a session refresh.

use nutrilog_core::{ApiRequest, ApiResult, Transport};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::refresh::RefreshCoordinator;

/// Per-call options for [`RestClient::api_fetch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Return a 401 as-is instead of refreshing the session and retrying.
    pub skip_refresh: bool,
}

impl FetchOptions {
    pub fn skip_refresh() -> Self {
        Self { skip_refresh: true }
    }
}

/// REST client over a [`Transport`] that recovers from expired sessions.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<dyn Transport>,
    refresh: RefreshCoordinator,
}

impl RestClient {
    pub fn new(transport: Arc<dyn Transport>, refresh: RefreshCoordinator) -> Self {
        Self { transport, refresh }
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Send `request`, refreshing the session and retrying once on a 401.
    ///
    /// If the refresh fails the original 401 is returned. The retry itself
    /// never triggers another refresh, so a second 401 is final.
    pub async fn api_fetch(&self, request: &ApiRequest, options: FetchOptions) -> ApiResult<Value> {
        match self.transport.send(request).await {
            Err(err) if err.is_unauthorized() && !options.skip_refresh => {
                debug!(method = %request.method(), path = request.path(), "unauthorized, refreshing session");
                if self.refresh.ensure_refreshed().await {
                    self.transport.send(request).await
                } else {
                    Err(err)
                }
            }
            outcome => outcome,
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let value = self.api_fetch(request, FetchOptions::default()).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_json(&ApiRequest::get(path)).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(&ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(&ApiRequest::put(path).with_json(body)?).await
    }

    pub async fn patch_json<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(&ApiRequest::patch(path).with_json(body)?).await
    }

    /// DELETE `path`, ignoring any response body.
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.api_fetch(&ApiRequest::delete(path), FetchOptions::default())
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}
