use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Anything the expiry sweeper can prune.
pub trait Sweep: Send + Sync {
    fn name(&self) -> &str;

    /// Remove every entry whose expiry is strictly before `now`, returning
    /// the number removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;
}

/// Keyed in-process store with an absolute expiry per entry.
///
/// Entries are never refused on read because of expiry; only the sweeper
/// removes them. Cloning shares the underlying map.
#[derive(Clone)]
pub struct RecordCache<V> {
    inner: Arc<RecordCacheInner<V>>,
}

struct RecordCacheInner<V> {
    name: String,
    entries: DashMap<String, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    payload: V,
    expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub name: String,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl<V: Clone + Send + Sync + 'static> RecordCache<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RecordCacheInner {
                name: name.into(),
                entries: DashMap::new(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        match self.inner.entries.get(key) {
            Some(entry) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.payload.clone())
            },
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&self, key: impl Into<String>, payload: V, expiry: DateTime<Utc>) {
        let key = key.into();
        debug!("{} cache put: {} (expires {})", self.inner.name, key, expiry);
        self.inner
            .entries
            .insert(key, CacheEntry { payload, expiry });
    }

    pub fn evict(&self, key: &str) -> Option<V> {
        self.inner.entries.remove(key).map(|(_, entry)| entry.payload)
    }

    #[cfg(test)]
    pub fn expiry(&self, key: &str) -> Option<DateTime<Utc>> {
        self.inner.entries.get(key).map(|entry| entry.expiry)
    }

    /// Keys whose expiry is strictly before `now`.
    pub fn scan_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        self.inner
            .entries
            .iter()
            .filter(|entry| entry.value().expiry < now)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.inner.name.clone(),
            entries: self.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Sweep for RecordCache<V> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for key in self.scan_expired(now) {
            // An entry refreshed between scan and removal is kept.
            if self
                .inner
                .entries
                .remove_if(&key, |_, entry| entry.expiry < now)
                .is_some()
            {
                debug!("{} cache evicted expired entry: {}", self.inner.name, key);
                removed += 1;
            }
        }
        removed
    }
}
