//! Typed wrappers for the remote API's resources.
//!
//! Reads go through the cache; writes go through the mutation engine.

mod meals;
mod summary;
mod targets;

pub use meals::MealItems;
pub use summary::DailySummaries;
pub use targets::{TargetWrite, Targets};
