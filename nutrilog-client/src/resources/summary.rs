//! Server-computed daily totals.

use nutrilog_cache::CacheRead;
use nutrilog_core::{keys, ApiResult, DailySummary, LogDate};

use crate::client::SyncClient;

pub(crate) fn summary_path(date: LogDate) -> String {
    format!("/api/daily-summary?date={}", date.format("%Y-%m-%d"))
}

/// Daily summary reads bound to a [`SyncClient`]. Summaries are never
/// written by the client; meal-item mutations invalidate them.
#[derive(Debug, Clone, Copy)]
pub struct DailySummaries<'a> {
    client: &'a SyncClient,
}

impl<'a> DailySummaries<'a> {
    pub(crate) fn new(client: &'a SyncClient) -> Self {
        Self { client }
    }

    pub async fn for_date(&self, date: LogDate) -> ApiResult<CacheRead<DailySummary>> {
        let rest = self.client.rest().clone();
        let path = summary_path(date);
        self.client
            .cache()
            .fetch_through(
                &keys::daily_summary(date),
                self.client.cache().config().default_freshness.clone(),
                move || async move { rest.get_json::<DailySummary>(&path).await },
            )
            .await
    }
}
