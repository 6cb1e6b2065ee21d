//! Single-flight session refresh.
//!
//! Any number of callers that hit a 401 at the same time share one call to
//! the refresh endpoint. The slot is cleared as soon as that call settles,
//! so a later 401 starts a new refresh instead of reusing an old outcome.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use nutrilog_core::{ApiRequest, Transport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
struct RefreshSlot {
    generation: u64,
    pending: Option<SharedRefresh>,
}

/// Coordinates session refreshes across concurrent requests.
///
/// Cloning yields another handle to the same slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    refresh_path: Arc<str>,
    slot: Arc<Mutex<RefreshSlot>>,
    attempts: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, refresh_path: impl Into<String>) -> Self {
        Self {
            transport,
            refresh_path: Arc::from(refresh_path.into()),
            slot: Arc::new(Mutex::new(RefreshSlot::default())),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Make sure a session refresh has been attempted since this call began.
    ///
    /// Joins the refresh already in flight if there is one, otherwise starts
    /// it. Returns true iff the refresh endpoint answered 2xx.
    pub async fn ensure_refreshed(&self) -> bool {
        let pending = {
            let mut slot = self.slot.lock();
            if let Some(pending) = slot.pending.clone() {
                debug!("joining in-flight session refresh");
                pending
            } else {
                slot.generation += 1;
                let pending = self.start(slot.generation);
                slot.pending = Some(pending.clone());
                pending
            }
        };
        pending.await
    }

    /// True while a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    /// Refresh calls issued so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn start(&self, generation: u64) -> SharedRefresh {
        let transport = Arc::clone(&self.transport);
        let path = Arc::clone(&self.refresh_path);
        let slot = Arc::clone(&self.slot);
        let attempts = Arc::clone(&self.attempts);

        async move {
            attempts.fetch_add(1, Ordering::Relaxed);
            info!(path = %path, "refreshing session");

            let refreshed = match transport.send(&ApiRequest::post(&*path)).await {
                Ok(_) => {
                    info!("session refreshed");
                    true
                }
                Err(err) => {
                    warn!(error = %err, "session refresh failed");
                    false
                }
            };

            let mut slot = slot.lock();
            if slot.generation == generation {
                slot.pending = None;
            }
            refreshed
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_path", &self.refresh_path)
            .field("refreshing", &self.is_refreshing())
            .field("attempts", &self.attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use nutrilog_core::Method;
    use nutrilog_test_utils::{Gate, MockTransport};
    use serde_json::json;

    const REFRESH: &str = "/api/auth/refresh";

    fn coordinator(transport: &MockTransport) -> RefreshCoordinator {
        RefreshCoordinator::new(Arc::new(transport.clone()), REFRESH)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let transport = MockTransport::new();
        let gate = Gate::new();
        transport.respond_gated(Method::Post, REFRESH, &gate, Ok(json!(null)));
        let refresh = coordinator(&transport);

        let mut callers: Vec<_> = (0..8).map(|_| Box::pin(refresh.ensure_refreshed())).collect();
        for caller in callers.iter_mut() {
            assert!(caller.as_mut().now_or_never().is_none());
        }
        assert_eq!(transport.calls_to(Method::Post, REFRESH), 1);
        assert!(refresh.is_refreshing());

        gate.open();
        let outcomes = join_all(callers).await;

        assert!(outcomes.into_iter().all(|refreshed| refreshed));
        assert_eq!(transport.calls_to(Method::Post, REFRESH), 1);
        assert_eq!(refresh.attempts(), 1);
        assert!(!refresh.is_refreshing());
    }

    #[tokio::test]
    async fn test_failed_refresh_is_shared_and_cleared() {
        let transport = MockTransport::new();
        let gate = Gate::new();
        transport.respond_gated(
            Method::Post,
            REFRESH,
            &gate,
            Err(nutrilog_core::ApiError::http(401, None, "expired")),
        );
        let refresh = coordinator(&transport);

        let mut first = Box::pin(refresh.ensure_refreshed());
        let mut second = Box::pin(refresh.ensure_refreshed());
        assert!(first.as_mut().now_or_never().is_none());
        assert!(second.as_mut().now_or_never().is_none());

        gate.open();
        assert!(!first.await);
        assert!(!second.await);
        assert!(!refresh.is_refreshing());
        assert_eq!(refresh.attempts(), 1);
    }

    #[tokio::test]
    async fn test_later_caller_starts_a_new_refresh() {
        let transport = MockTransport::new();
        transport.ok(Method::Post, REFRESH, json!(null));
        let refresh = coordinator(&transport);

        assert!(refresh.ensure_refreshed().await);
        assert!(refresh.ensure_refreshed().await);
        assert_eq!(transport.calls_to(Method::Post, REFRESH), 2);
    }

    #[tokio::test]
    async fn test_network_failure_reports_false() {
        let transport = MockTransport::new();
        let refresh = coordinator(&transport);
        assert!(!refresh.ensure_refreshed().await);
    }
}
