use nutrilog_cache::{KeyedCache, MutationState};
use nutrilog_core::CacheKey;
use nutrilog_test_utils::generators::arb_cache_key;
use proptest::prelude::*;
use serde_json::json;

fn populated(keys: &[CacheKey]) -> KeyedCache {
    let cache = KeyedCache::with_defaults();
    for (i, key) in keys.iter().enumerate() {
        cache.set_value(key.clone(), json!(i));
    }
    cache
}

proptest! {
    #[test]
    fn invalidate_hides_exactly_the_prefix(
        keys in prop::collection::vec(arb_cache_key(), 1..16),
        prefix in arb_cache_key(),
    ) {
        let cache = populated(&keys);
        cache.invalidate(&prefix);

        for key in &keys {
            prop_assert_eq!(cache.get(key).is_none(), key.starts_with(&prefix));
            prop_assert!(cache.peek(key).is_some());
        }
    }

    #[test]
    fn set_touches_only_its_key(
        keys in prop::collection::vec(arb_cache_key(), 1..16),
        target in arb_cache_key(),
    ) {
        let cache = populated(&keys);
        let before: Vec<_> = keys
            .iter()
            .filter(|key| **key != target)
            .map(|key| (key.clone(), cache.peek(key)))
            .collect();

        cache.set_value(target.clone(), json!("new"));

        prop_assert_eq!(cache.get(&target).map(|entry| entry.into_value()), Some(json!("new")));
        for (key, entry) in before {
            prop_assert_eq!(cache.peek(&key), entry);
        }
    }

    #[test]
    fn set_after_invalidate_is_served(key in arb_cache_key()) {
        let cache = populated(std::slice::from_ref(&key));
        cache.invalidate(&key);
        cache.set_value(key.clone(), json!(true));
        prop_assert!(cache.get(&key).is_some());
    }

    #[test]
    fn rollback_restores_prior_state(
        keys in prop::collection::vec(arb_cache_key(), 0..8),
        target in arb_cache_key(),
    ) {
        let cache = populated(&keys);
        let before = cache.peek(&target);

        let ticket = cache.begin_mutation(&target, &target, |_| Some(json!("speculative")));
        let state = cache.rollback_mutation(ticket, &target, &target);

        prop_assert_eq!(state, MutationState::RolledBack);
        prop_assert_eq!(cache.peek(&target), before);
        prop_assert_eq!(cache.stats().invalidations, 0);
    }
}
