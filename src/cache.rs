//! Read-through cache for source fetches.
//!
//! Keyed by (source, parameters) with a TTL, passed in as a dependency —
//! never held as module-global state. Strictly an optimization layer: the
//! composed feed must be correct with this cache absent or empty.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::types::SourceType;

/// Cache key: which source, fetched with which parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: SourceType,
    pub params: String,
}

impl CacheKey {
    pub fn new(source: SourceType, params: impl Into<String>) -> Self {
        CacheKey {
            source,
            params: params.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    stored_at: DateTime<Utc>,
    value: V,
}

/// TTL-bounded read-through cache over cloneable fetch results.
pub struct ReadThroughCache<V: Clone> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> ReadThroughCache<V> {
    pub fn new(ttl_secs: i64) -> Self {
        ReadThroughCache {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// A hit inside the TTL. Expired entries read as absent and are dropped.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<V> {
        let fresh = match self.entries.get(key) {
            Some(entry) if now - entry.stored_at < self.ttl => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn put(&self, key: CacheKey, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                stored_at: now,
                value,
            },
        );
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn hit_inside_ttl_miss_after() {
        let cache: ReadThroughCache<Vec<u32>> = ReadThroughCache::new(300);
        let key = CacheKey::new(SourceType::Idea, "portfolio=alpha");
        let now = t0();

        cache.put(key.clone(), vec![1, 2, 3], now);
        assert_eq!(
            cache.get(&key, now + Duration::seconds(299)),
            Some(vec![1, 2, 3])
        );
        assert_eq!(cache.get(&key, now + Duration::seconds(300)), None);
        // The expired entry was physically dropped on read.
        assert!(cache.is_empty());
    }

    #[test]
    fn params_discriminate_entries_for_one_source() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(60);
        let now = t0();
        cache.put(CacheKey::new(SourceType::Idea, "portfolio=alpha"), 1, now);
        cache.put(CacheKey::new(SourceType::Idea, "portfolio=beta"), 2, now);

        assert_eq!(
            cache.get(&CacheKey::new(SourceType::Idea, "portfolio=alpha"), now),
            Some(1)
        );
        assert_eq!(
            cache.get(&CacheKey::new(SourceType::Idea, "portfolio=beta"), now),
            Some(2)
        );
    }

    #[test]
    fn put_overwrites_and_restarts_the_ttl() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(60);
        let key = CacheKey::new(SourceType::Proposal, "");
        let now = t0();

        cache.put(key.clone(), 1, now);
        cache.put(key.clone(), 2, now + Duration::seconds(50));
        assert_eq!(cache.get(&key, now + Duration::seconds(100)), Some(2));
    }

    #[test]
    fn invalidate_removes_the_entry() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(60);
        let key = CacheKey::new(SourceType::Deliverable, "");
        cache.put(key.clone(), 7, t0());
        cache.invalidate(&key);
        assert_eq!(cache.get(&key, t0()), None);
    }
}
