//! Meal items logged per day.

use chrono::Utc;
use nutrilog_cache::CacheRead;
use nutrilog_core::{keys, ApiResult, LogDate, MealItem, MealItemId, MealItemPatch, NewMealItem};

use crate::client::SyncClient;
use crate::mutation::{typed_update, MutationPlan};

const COLLECTION: &str = "/api/meal-items";

pub(crate) fn list_path(date: LogDate) -> String {
    format!("{}?date={}", COLLECTION, date.format("%Y-%m-%d"))
}

pub(crate) fn item_path(id: &MealItemId) -> String {
    format!("{}/{}", COLLECTION, id)
}

/// Every write to a day's list changes that day's server-side summary.
fn plan_for(date: LogDate) -> MutationPlan {
    MutationPlan::new(keys::meal_items_by_date(date)).with_dependent(keys::daily_summary(date))
}

/// Meal-item operations bound to a [`SyncClient`].
#[derive(Debug, Clone, Copy)]
pub struct MealItems<'a> {
    client: &'a SyncClient,
}

impl<'a> MealItems<'a> {
    pub(crate) fn new(client: &'a SyncClient) -> Self {
        Self { client }
    }

    /// Items logged on `date`, served from cache until invalidated.
    pub async fn list_by_date(&self, date: LogDate) -> ApiResult<CacheRead<Vec<MealItem>>> {
        let rest = self.client.rest().clone();
        let path = list_path(date);
        self.client
            .cache()
            .fetch_through(
                &keys::meal_items_by_date(date),
                self.client.cache().config().default_freshness.clone(),
                move || async move { rest.get_json::<Vec<MealItem>>(&path).await },
            )
            .await
    }

    /// Log a new item. A placeholder with a temporary id is appended to the
    /// day's cached list until the server confirms.
    pub async fn create(&self, new: &NewMealItem) -> ApiResult<MealItem> {
        let placeholder = MealItem::pending(new, Utc::now());
        self.client
            .mutations()
            .run_optimistic(
                plan_for(new.date),
                typed_update(move |items: Option<Vec<MealItem>>| {
                    let mut items = items?;
                    items.push(placeholder);
                    Some(items)
                }),
                || self.client.rest().post_json(COLLECTION, new),
            )
            .await
    }

    /// Apply `patch` to the item `id` logged on `date`.
    pub async fn update(
        &self,
        id: &MealItemId,
        date: LogDate,
        patch: &MealItemPatch,
    ) -> ApiResult<MealItem> {
        let path = item_path(id);
        self.client
            .mutations()
            .run_optimistic(
                plan_for(date),
                typed_update(|items: Option<Vec<MealItem>>| {
                    let mut items = items?;
                    let item = items.iter_mut().find(|item| &item.id == id)?;
                    patch.apply(item);
                    Some(items)
                }),
                || self.client.rest().patch_json(&path, patch),
            )
            .await
    }

    /// Delete the item `id` logged on `date`. It disappears from the cached
    /// list immediately.
    pub async fn delete(&self, id: &MealItemId, date: LogDate) -> ApiResult<()> {
        let path = item_path(id);
        self.client
            .mutations()
            .run_optimistic(
                plan_for(date),
                typed_update(|items: Option<Vec<MealItem>>| {
                    let mut items = items?;
                    items.retain(|item| &item.id != id);
                    Some(items)
                }),
                || self.client.rest().delete(&path),
            )
            .await
    }
}
