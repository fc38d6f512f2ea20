//! Cluster-wide permission cache.
//!
//! Writes are store-if-absent: when two nodes compute the same entry at the
//! same time, the first write wins and later writers keep the stored value.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error raised by a cache backend.
#[derive(Debug, Clone, Error)]
#[error("cache backend error: {0}")]
pub struct CacheError(pub String);

/// A cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Flag(bool),
    ReferenceSet(BTreeSet<String>),
}

impl CacheValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            CacheValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_reference_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            CacheValue::ReferenceSet(set) => Some(set),
            _ => None,
        }
    }
}

/// Key/value cache shared by every node serving the same database.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    /// Store `value` unless a live entry exists. Returns whether it was stored.
    async fn put_if_absent(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Drop an entry.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: CacheValue, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process [`PermissionCache`] for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, live or expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl PermissionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(None)
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_value_wire_format() {
        let json = serde_json::to_value(CacheValue::Flag(true)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "flag", "value": true}));

        let set: CacheValue =
            serde_json::from_str(r#"{"kind": "reference_set", "value": ["u-2", "u-1"]}"#).unwrap();
        assert_eq!(
            set.as_reference_set().map(|s| s.iter().cloned().collect::<Vec<_>>()),
            Some(vec!["u-1".to_string(), "u-2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_put_if_absent_keeps_first_value() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        assert!(cache.put_if_absent("admin.u1", CacheValue::Flag(true), ttl).await.unwrap());
        assert!(!cache.put_if_absent("admin.u1", CacheValue::Flag(false), ttl).await.unwrap());
        assert_eq!(cache.get("admin.u1").await.unwrap(), Some(CacheValue::Flag(true)));
    }

    #[tokio::test]
    async fn test_expired_entry_is_replaced() {
        let cache = MemoryCache::new();

        cache
            .put_if_absent("k", CacheValue::Flag(true), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());

        cache
            .put_if_absent("k", CacheValue::Flag(true), Duration::ZERO)
            .await
            .unwrap();
        assert!(
            cache
                .put_if_absent("k", CacheValue::Flag(false), Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert_eq!(cache.get("k").await.unwrap(), Some(CacheValue::Flag(false)));
    }

    #[tokio::test]
    async fn test_concurrent_writers_one_wins() {
        let cache = Arc::new(MemoryCache::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let set: BTreeSet<String> = [format!("user-{}", i)].into_iter().collect();
                cache
                    .put_if_absent("administrator_reference_id", CacheValue::ReferenceSet(set), Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut stored = 0;
        for handle in handles {
            if handle.await.unwrap() {
                stored += 1;
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_purge() {
        let cache = MemoryCache::new();
        cache.put_if_absent("a", CacheValue::Flag(true), Duration::from_secs(60)).await.unwrap();
        cache.put_if_absent("b", CacheValue::Flag(true), Duration::ZERO).await.unwrap();

        cache.purge_expired();
        assert_eq!(cache.len(), 1);

        cache.remove("a").await.unwrap();
        assert!(cache.is_empty());
    }
}
