//! Nutrilog Client - Data sync layer for the Nutrilog API
//!
//! Layers, bottom to top:
//!
//! - [`transport`]: one HTTP exchange with the session cookie attached.
//! - [`refresh`]: single-flight session refresh.
//! - [`fetch`]: authenticated fetch that refreshes and retries once on 401.
//! - [`mutation`]: optimistic writes with snapshot and rollback over the
//!   keyed cache from `nutrilog-cache`.
//! - [`resources`]: typed meal-item, target, and summary operations.
//!
//! [`SyncClient`] wires them together and is the only thing UI code needs.

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mutation;
pub mod refresh;
pub mod resources;
pub mod telemetry;
pub mod transport;

pub use client::SyncClient;
pub use config::{CacheSettings, ClientConfig, ConfigError};
pub use error::{ClientError, ClientResult};
pub use fetch::{FetchOptions, RestClient};
pub use mutation::{typed_update, MutationContext, MutationEngine, MutationPlan};
pub use refresh::RefreshCoordinator;
pub use resources::{DailySummaries, MealItems, TargetWrite, Targets};
pub use telemetry::init_tracing;
pub use transport::HttpTransport;

pub use nutrilog_cache::{
    CacheConfig, CacheRead, CacheStats, Freshness, KeyedCache, MutationState, MutationTicket,
};
pub use nutrilog_core::{ApiError, ApiResult, ApiResultExt, CacheKey, ErrorKind};
