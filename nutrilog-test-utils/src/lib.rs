//! Nutrilog Test Utilities
//!
//! Shared test infrastructure for the Nutrilog workspace:
//! - A scripted [`MockTransport`] with gated responses for concurrency tests
//! - Proptest generators for keys and entities
//! - Fixtures for a typical logged day
//! - Assertions for API errors

pub use nutrilog_core::{
    ApiError, ApiRequest, ApiResult, CacheKey, DailySummary, KeySegment, LogDate, MacroTotals,
    MealItem, MealItemId, Method, NewMealItem, NutritionTarget, TargetId, TargetInput, Transport,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// GATE
// ============================================================================

/// A latch that holds scripted responses until a test opens it.
///
/// Cloning yields another handle to the same latch.
#[derive(Debug, Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the gate has been opened.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once open.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

#[derive(Debug, Clone)]
struct Scripted {
    result: ApiResult<Value>,
    gate: Option<Gate>,
}

/// Transport that replays scripted responses per `(method, path)`.
///
/// Responses for a route are consumed in order; the last one keeps being
/// returned once the queue is down to it. Requests to unscripted routes fail
/// with a network error. Every request is recorded before its gate (if any)
/// is awaited, so call counts are observable while responses are held.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<(Method, String), VecDeque<Scripted>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method path`.
    pub fn respond(&self, method: Method, path: impl Into<String>, result: ApiResult<Value>) -> &Self {
        self.push(method, path.into(), Scripted { result, gate: None })
    }

    /// Queue a response that is only delivered once `gate` opens.
    pub fn respond_gated(
        &self,
        method: Method,
        path: impl Into<String>,
        gate: &Gate,
        result: ApiResult<Value>,
    ) -> &Self {
        self.push(
            method,
            path.into(),
            Scripted {
                result,
                gate: Some(gate.clone()),
            },
        )
    }

    /// Queue a 2xx response with `body`.
    pub fn ok(&self, method: Method, path: impl Into<String>, body: Value) -> &Self {
        self.respond(method, path, Ok(body))
    }

    /// Queue a non-2xx response with the API's error envelope.
    pub fn fail(&self, method: Method, path: impl Into<String>, status: u16, code: &str) -> &Self {
        let error = ApiError::http(status, Some(code.to_string()), format!("{code} ({status})"));
        self.respond(method, path, Err(error))
    }

    fn push(&self, method: Method, path: String, scripted: Scripted) -> &Self {
        self.routes
            .lock()
            .entry((method, path))
            .or_default()
            .push_back(scripted);
        self
    }

    fn next_response(&self, method: Method, path: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of requests sent to exactly `method path`.
    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.method() == method && request.path() == path)
            .count()
    }

    /// Body of the most recent request to `method path`.
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|request| request.method() == method && request.path() == path)
            .and_then(|request| request.body().cloned())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResult<Value> {
        self.requests.lock().push(request.clone());
        let Some(scripted) = self.next_response(request.method(), request.path()) else {
            return Err(ApiError::network(format!(
                "no scripted response for {} {}",
                request.method(),
                request.path()
            )));
        };
        if let Some(gate) = scripted.gate {
            gate.wait().await;
        }
        scripted.result
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;

    /// Generate a key segment drawn from a small alphabet so prefixes collide.
    pub fn arb_key_segment() -> impl Strategy<Value = KeySegment> {
        prop_oneof![
            prop::sample::select(vec!["meal-items", "by-date", "targets", "active", "daily-summary"])
                .prop_map(KeySegment::from),
            (0i64..4).prop_map(KeySegment::from),
            any::<bool>().prop_map(KeySegment::from),
        ]
    }

    /// Generate a key of one to four segments.
    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        prop::collection::vec(arb_key_segment(), 1..=4).prop_map(CacheKey::from_segments)
    }

    /// Generate a date in 2024.
    pub fn arb_log_date() -> impl Strategy<Value = LogDate> {
        (1u32..=12, 1u32..=28).prop_map(|(month, day)| {
            NaiveDate::from_ymd_opt(2024, month, day).unwrap_or_default()
        })
    }

    pub fn arb_meal_item() -> impl Strategy<Value = MealItem> {
        (
            "[a-z0-9]{4,12}",
            arb_log_date(),
            "[A-Za-z ]{1,24}",
            0.0f64..2000.0,
            0.0f64..200.0,
            0.0f64..300.0,
            0.0f64..150.0,
        )
            .prop_map(|(id, date, name, calories, protein_g, carbs_g, fat_g)| MealItem {
                id: MealItemId::new(id),
                date,
                name,
                calories,
                protein_g,
                carbs_g,
                fat_g,
                logged_at: Utc.timestamp_opt(1_717_200_000, 0).single().unwrap_or_default(),
            })
    }

    pub fn arb_target_input() -> impl Strategy<Value = TargetInput> {
        (1200.0f64..4000.0, 50.0f64..250.0, 100.0f64..400.0, 30.0f64..150.0).prop_map(
            |(calories, protein_g, carbs_g, fat_g)| TargetInput {
                calories,
                protein_g,
                carbs_g,
                fat_g,
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    /// The day most fixtures are logged on.
    pub fn log_date() -> LogDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default()
    }

    fn logged_at(hour: u32) -> nutrilog_core::Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn meal(id: &str, name: &str, calories: f64) -> MealItem {
        MealItem {
            id: MealItemId::new(id),
            date: log_date(),
            name: name.to_string(),
            calories,
            protein_g: 10.0,
            carbs_g: 20.0,
            fat_g: 5.0,
            logged_at: logged_at(8),
        }
    }

    /// Two items logged on [`log_date`]: `meal-1` and `meal-2`.
    pub fn logged_day() -> Vec<MealItem> {
        vec![meal("meal-1", "Oatmeal", 300.0), meal("meal-2", "Chicken salad", 450.0)]
    }

    pub fn new_meal() -> NewMealItem {
        NewMealItem {
            date: log_date(),
            name: "Greek yogurt".to_string(),
            calories: 150.0,
            protein_g: 15.0,
            carbs_g: 8.0,
            fat_g: 4.0,
        }
    }

    pub fn active_target() -> NutritionTarget {
        NutritionTarget {
            id: TargetId::new("target-1"),
            calories: 2000.0,
            protein_g: 120.0,
            carbs_g: 220.0,
            fat_g: 70.0,
            active: true,
        }
    }

    pub fn target_input() -> TargetInput {
        TargetInput {
            calories: 2200.0,
            protein_g: 140.0,
            carbs_g: 230.0,
            fat_g: 75.0,
        }
    }

    pub fn summary(items: &[MealItem]) -> DailySummary {
        let totals = items.iter().fold(MacroTotals::default(), |mut acc, item| {
            acc.calories += item.calories;
            acc.protein_g += item.protein_g;
            acc.carbs_g += item.carbs_g;
            acc.fat_g += item.fat_g;
            acc
        });
        DailySummary {
            date: log_date(),
            totals,
            item_count: items.len() as u32,
        }
    }

    /// JSON body of a refresh endpoint success.
    pub fn refresh_ok() -> Value {
        json!({ "ok": true })
    }

    /// JSON of `value`; fixtures only contain serializable data.
    pub fn to_json<T: serde::Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or(Value::Null)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    /// Assert a result failed with an HTTP error of `status`.
    pub fn assert_http_status<T: std::fmt::Debug>(result: &ApiResult<T>, status: u16) {
        match result {
            Err(err) => assert_eq!(
                err.status(),
                Some(status),
                "Expected HTTP {status}, got {err:?}"
            ),
            Ok(value) => panic!("Expected HTTP {status}, got Ok({value:?})"),
        }
    }

    pub fn assert_unauthorized<T: std::fmt::Debug>(result: &ApiResult<T>) {
        assert_http_status(result, 401);
    }

    pub fn assert_network_error<T: std::fmt::Debug>(result: &ApiResult<T>) {
        match result {
            Err(err) => assert_eq!(
                err.kind(),
                nutrilog_core::ErrorKind::Network,
                "Expected network error, got {err:?}"
            ),
            Ok(value) => panic!("Expected network error, got Ok({value:?})"),
        }
    }

    /// Assert `items` contains an item with id `id`.
    pub fn assert_contains_item(items: &[MealItem], id: &str) {
        assert!(
            items.iter().any(|item| item.id.as_str() == id),
            "Expected item {id} in {:?}",
            items.iter().map(|item| item.id.as_str()).collect::<Vec<_>>()
        );
    }

    pub fn assert_lacks_item(items: &[MealItem], id: &str) {
        assert!(
            items.iter().all(|item| item.id.as_str() != id),
            "Did not expect item {id}"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
