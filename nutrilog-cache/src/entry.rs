//! Cache entries.

use chrono::Utc;
use nutrilog_core::{ApiResult, CacheKey, Timestamp};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// One cached value. Owned by the cache; callers only ever receive clones.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    key: CacheKey,
    value: Value,
    fetched_at: Timestamp,
    stale: bool,
}

impl CacheEntry {
    pub(crate) fn new(key: CacheKey, value: Value, fetched_at: Timestamp) -> Self {
        Self {
            key,
            value,
            fetched_at,
            stale: false,
        }
    }

    pub(crate) fn mark_stale(&mut self) -> bool {
        let was_fresh = !self.stale;
        self.stale = true;
        was_fresh
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// When the value was fetched from the API or written speculatively.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// True once the entry has been invalidated.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Decode the stored JSON into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilog_core::cache_key;
    use serde_json::json;

    #[test]
    fn test_mark_stale_reports_transition() {
        let mut entry = CacheEntry::new(cache_key!["targets", "active"], json!(1), Utc::now());
        assert!(!entry.is_stale());
        assert!(entry.mark_stale());
        assert!(!entry.mark_stale());
        assert!(entry.is_stale());
    }

    #[test]
    fn test_decode_mismatch_is_codec_error() {
        let entry = CacheEntry::new(cache_key!["x"], json!("text"), Utc::now());
        let err = entry.decode::<Vec<u32>>().unwrap_err();
        assert_eq!(err.kind(), nutrilog_core::ErrorKind::Codec);
    }

    #[test]
    fn test_age_of_past_entry() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        let entry = CacheEntry::new(cache_key!["x"], json!(null), past);
        assert!(entry.age() >= Duration::from_secs(4));
    }
}
