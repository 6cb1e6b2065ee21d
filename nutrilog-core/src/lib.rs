//! Nutrilog Core - Shared Types
//!
//! Pure data structures shared by the cache and client crates:
//! - Domain records exchanged with the remote API (meal items, targets, summaries)
//! - Hierarchical cache keys
//! - The typed error surfaced by every network-facing layer
//! - The request/transport seam used to reach the remote API

pub mod entities;
pub mod error;
pub mod identity;
pub mod key;
pub mod transport;

pub use entities::{
    DailySummary, MacroTotals, MealItem, MealItemPatch, NewMealItem, NutritionTarget,
    TargetInput,
};
pub use error::{ApiError, ApiResult, ApiResultExt, ErrorBody, ErrorEnvelope, ErrorKind};
pub use identity::{new_temp_id, LogDate, MealItemId, TargetId, Timestamp, TEMP_ID_PREFIX};
pub use key::{keys, CacheKey, KeySegment};
pub use transport::{ApiRequest, Method, Transport};
