//! In-process cache tier
//!
//! Fastest, volatile, per-instance. A `HashMap` behind `tokio::sync::RwLock`,
//! mutated with short lock scopes and never held across I/O. Entries expire
//! lazily at read time; an expired entry is removed by the read that finds it.

use crate::cache::entry::CacheEntry;
use crate::cache::pattern::KeyPattern;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct MemoryTier {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value if present and still valid; removes the
    /// entry and misses if it has expired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                Some(entry) if entry.is_valid(Utc::now()) => return Some(entry.data.clone()),
                Some(_) => {} // expired, fall through to remove under a write lock
                None => return None,
            }
        }

        let mut guard = self.entries.write().await;
        if let Some(entry) = guard.get(key) {
            // A concurrent writer may have refreshed the entry in between
            if entry.is_valid(Utc::now()) {
                return Some(entry.data.clone());
            }
            guard.remove(key);
            tracing::debug!(key, "expired in-process entry removed");
        }
        None
    }

    pub async fn insert(&self, key: &str, data: Value, ttl_seconds: u64) {
        let mut guard = self.entries.write().await;
        guard.insert(key.to_string(), CacheEntry::new(data, ttl_seconds));
    }

    pub async fn remove(&self, key: &str) -> bool {
        let mut guard = self.entries.write().await;
        guard.remove(key).is_some()
    }

    /// Full-scan removal of every key the pattern matches
    pub async fn remove_matching(&self, pattern: &KeyPattern) -> usize {
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|key, _| !pattern.matches(key));
        before - guard.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
