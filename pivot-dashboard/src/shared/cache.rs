use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use std::{borrow::Borrow, hash::Hash, time::Duration};

/// Default freshness of per-symbol level data.
pub const DEFAULT_LEVEL_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
}

/// Per-key TTL cache of auxiliary data.
///
/// Lookups never fetch. An entry is fresh while `now - fetched_at < ttl`;
/// stale entries stay in place until a newer fetch overwrites them.
#[derive(Debug, Clone)]
pub struct AuxCache<K, V> {
    entries: FnvHashMap<K, CacheEntry<V>>,
    ttl: TimeDelta,
}

impl<K, V> AuxCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: FnvHashMap::default(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Fresh value for `key`, or `None` if absent or expired.
    pub fn get<Q>(&self, key: &Q, now: DateTime<Utc>) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries
            .get(key)
            .filter(|entry| self.is_entry_fresh(entry, now))
            .map(|entry| &entry.value)
    }

    pub fn is_fresh<Q>(&self, key: &Q, now: DateTime<Utc>) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.get(key, now).is_some()
    }

    pub fn insert(&mut self, key: K, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_entry_fresh(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at < self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ttl_boundaries() {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let ttl = TimeDelta::minutes(5);
        let mut cache = AuxCache::<String, u32>::new(DEFAULT_LEVEL_TTL);

        assert_eq!(cache.get("BTCUSDT", t0), None);
        cache.insert("BTCUSDT".to_string(), 1, t0);

        assert_eq!(cache.get("BTCUSDT", t0), Some(&1));
        assert_eq!(
            cache.get("BTCUSDT", t0 + ttl - TimeDelta::milliseconds(1)),
            Some(&1)
        );
        assert_eq!(cache.get("BTCUSDT", t0 + ttl), None);
        assert_eq!(cache.get("BTCUSDT", t0 + ttl + TimeDelta::milliseconds(1)), None);

        // Stale entry is kept until refreshed
        assert_eq!(cache.len(), 1);
        cache.insert("BTCUSDT".to_string(), 2, t0 + ttl);
        assert_eq!(cache.get("BTCUSDT", t0 + ttl), Some(&2));
        assert_eq!(cache.len(), 1);
    }
}
