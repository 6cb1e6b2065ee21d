//! Hierarchical cache keys.
//!
//! A [`CacheKey`] is an ordered tuple of scalar segments, e.g.
//! `["meal-items", "by-date", "2024-06-01"]`. Keys form a prefix hierarchy:
//! the key `["meal-items", "by-date"]` covers every per-date key below it, which
//! is what scoped invalidation operates on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single segment of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Bool(value) => write!(f, "{}", value),
            KeySegment::Int(value) => write!(f, "{}", value),
            KeySegment::Str(value) => f.write_str(value),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Str(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Int(value)
    }
}

impl From<bool> for KeySegment {
    fn from(value: bool) -> Self {
        KeySegment::Bool(value)
    }
}

impl From<NaiveDate> for KeySegment {
    fn from(value: NaiveDate) -> Self {
        KeySegment::Str(value.format("%Y-%m-%d").to_string())
    }
}

/// Ordered tuple of segments addressing one cache entry (or, used as a
/// prefix, a whole subtree of entries).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<KeySegment>);

impl CacheKey {
    /// The empty key. As a prefix it matches every entry.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<KeySegment>) -> Self {
        Self(segments)
    }

    /// Extend this key by one segment.
    pub fn child(&self, segment: impl Into<KeySegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `prefix` equals this key or is an ancestor of it.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The key one level up, or `None` for the root.
    pub fn parent(&self) -> Option<CacheKey> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", segment)?;
        }
        f.write_str("]")
    }
}

/// Build a [`CacheKey`] from heterogeneous segments.
///
/// ```
/// use nutrilog_core::cache_key;
/// let key = cache_key!["meal-items", "by-date", "2024-06-01"];
/// assert_eq!(key.len(), 3);
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($segment:expr),* $(,)?) => {
        $crate::key::CacheKey::from_segments(vec![$($crate::key::KeySegment::from($segment)),*])
    };
}

/// Keys used by the meal-log and target resources.
pub mod keys {
    use super::CacheKey;
    use crate::identity::LogDate;

    pub const MEAL_ITEMS: &str = "meal-items";
    pub const BY_DATE: &str = "by-date";
    pub const DAILY_SUMMARY: &str = "daily-summary";
    pub const TARGETS: &str = "targets";
    pub const ACTIVE: &str = "active";

    /// Every cached meal-item list.
    pub fn meal_items() -> CacheKey {
        cache_key![MEAL_ITEMS]
    }

    /// Every per-date meal-item list.
    pub fn meal_items_by_date_all() -> CacheKey {
        cache_key![MEAL_ITEMS, BY_DATE]
    }

    /// Meal items logged on one day.
    pub fn meal_items_by_date(date: LogDate) -> CacheKey {
        meal_items_by_date_all().child(date)
    }

    /// Every cached daily summary.
    pub fn daily_summaries() -> CacheKey {
        cache_key![DAILY_SUMMARY]
    }

    /// Server-aggregated totals for one day; depends on that day's meal items.
    pub fn daily_summary(date: LogDate) -> CacheKey {
        daily_summaries().child(date)
    }

    /// Every cached target.
    pub fn targets() -> CacheKey {
        cache_key![TARGETS]
    }

    /// The currently active nutrition target.
    pub fn active_target() -> CacheKey {
        cache_key![TARGETS, ACTIVE]
    }
}
