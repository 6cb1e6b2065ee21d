//! Identity types for Nutrilog records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Calendar day a meal is logged against (serialized as `YYYY-MM-DD`).
pub type LogDate = NaiveDate;

/// Prefix marking identifiers minted on the client for optimistic records.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Mint a client-side placeholder id. UUIDv7 keeps placeholders sortable by
/// creation time until the server-assigned id replaces them on refetch.
pub fn new_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::now_v7())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Placeholder id for a record that only exists in the cache so far.
            pub fn temporary() -> Self {
                Self(new_temp_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True when this id was minted client-side and never confirmed.
            pub fn is_temporary(&self) -> bool {
                self.0.starts_with(TEMP_ID_PREFIX)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Server identifier of a logged meal item.
    MealItemId
);

string_id!(
    /// Server identifier of a nutrition target.
    TargetId
);
