//! Three-tier read-through/write-through cache
//!
//! Level 1: in-process map (fastest, volatile, per-instance)
//! Level 2: distributed KV store (shared, medium latency, native expiry)
//! Level 3: relational persistent store (shared, slowest, durable)
//!
//! Reads cascade fastest-first and promote hits into the faster tiers;
//! writes fan out to every configured tier concurrently. Consistency across
//! tiers is best-effort: the persistent tier is authoritative and the faster
//! tiers are pure caches of it. A tier that is not configured is skipped.
//! No timeouts are imposed here; callers needing bounded latency wrap calls
//! in `tokio::time::timeout`.

pub mod entry;
pub mod keys;
pub mod kv;
pub mod memory;
pub mod pattern;
pub mod sql;
pub mod store;

pub use entry::{CacheEntry, CacheOptions, CacheTtls};
pub use keys::KeyGenerator;
pub use kv::HttpKvStore;
pub use memory::MemoryTier;
pub use pattern::KeyPattern;
pub use sql::SqlCacheStore;
pub use store::TierStore;

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CacheManager {
    memory: MemoryTier,
    distributed: Option<Arc<dyn TierStore>>,
    persistent: Option<Arc<dyn TierStore>>,
    ttls: CacheTtls,
}

impl CacheManager {
    /// A manager with only the in-process tier configured
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            memory: MemoryTier::new(),
            distributed: None,
            persistent: None,
            ttls,
        }
    }

    pub fn with_distributed(mut self, store: Arc<dyn TierStore>) -> Self {
        self.distributed = Some(store);
        self
    }

    pub fn with_persistent(mut self, store: Arc<dyn TierStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Multi-level read with promotion.
    ///
    /// Tiers are tried fastest-first, each only if the faster one missed. A
    /// distributed hit is promoted into memory; a persistent hit is promoted
    /// into both faster tiers. Tier failures and unparseable payloads are
    /// logged and degrade to a miss for that tier only, so a fault and a
    /// miss are indistinguishable to the caller.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, error = %e, "cached value failed to deserialize, treating as miss");
                None
            }
        }
    }

    async fn get_value(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.memory.get(key).await {
            return Some(value);
        }

        if let Some(store) = &self.distributed {
            if let Some((value, _)) = self.fetch_tier(store, key).await {
                self.memory.insert(key, value.clone(), self.ttls.memory).await;
                debug!(key, "distributed hit promoted to memory");
                return Some(value);
            }
        }

        if let Some(store) = &self.persistent {
            if let Some((value, raw)) = self.fetch_tier(store, key).await {
                if let Some(kv) = &self.distributed {
                    if let Err(e) = kv.put(key, &raw, self.ttls.distributed).await {
                        warn!(tier = kv.name(), key, error = %e, "promotion write failed");
                    }
                }
                self.memory.insert(key, value.clone(), self.ttls.memory).await;
                debug!(key, "persistent hit promoted to faster tiers");
                return Some(value);
            }
        }

        None
    }

    async fn fetch_tier(&self, store: &Arc<dyn TierStore>, key: &str) -> Option<(Value, String)> {
        match store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some((value, raw)),
                Err(e) => {
                    warn!(tier = store.name(), key, error = %e,
                          "stored payload unparseable, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(tier = store.name(), key, error = %e, "tier read failed, treating as miss");
                None
            }
        }
    }

    /// Write to every configured tier, remote tiers concurrently, each with
    /// its own TTL from the merged options/defaults. Partial failures are
    /// logged and never rolled back.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: Option<CacheOptions>) {
        let ttls = options.unwrap_or_default().merged_with(self.ttls);
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "value not serializable, skipping cache write");
                return;
            }
        };
        let raw = json.to_string();

        self.memory.insert(key, json, ttls.memory).await;

        let distributed = async {
            if let Some(store) = &self.distributed {
                if let Err(e) = store.put(key, &raw, ttls.distributed).await {
                    warn!(tier = store.name(), key, error = %e, "tier write failed");
                }
            }
        };
        let persistent = async {
            if let Some(store) = &self.persistent {
                if let Err(e) = store.put(key, &raw, ttls.persistent).await {
                    warn!(tier = store.name(), key, error = %e, "tier write failed");
                }
            }
        };
        futures::join!(distributed, persistent);
    }

    /// Delete the key from every configured tier; misses are not errors
    pub async fn invalidate(&self, key: &str) {
        self.memory.remove(key).await;

        let distributed = async {
            if let Some(store) = &self.distributed {
                if let Err(e) = store.delete(key).await {
                    warn!(tier = store.name(), key, error = %e, "tier delete failed");
                }
            }
        };
        let persistent = async {
            if let Some(store) = &self.persistent {
                if let Err(e) = store.delete(key).await {
                    warn!(tier = store.name(), key, error = %e, "tier delete failed");
                }
            }
        };
        futures::join!(distributed, persistent);
    }

    /// Remove every key matching the glob from every configured tier
    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
        let compiled = KeyPattern::compile(pattern)?;

        let removed = self.memory.remove_matching(&compiled).await;
        debug!(pattern, removed, "in-process entries invalidated");

        if let Some(store) = &self.distributed {
            match store.delete_matching(&compiled).await {
                Ok(removed) => debug!(tier = store.name(), pattern, removed, "entries invalidated"),
                Err(e) => warn!(tier = store.name(), pattern, error = %e, "pattern delete failed"),
            }
        }
        if let Some(store) = &self.persistent {
            match store.delete_matching(&compiled).await {
                Ok(removed) => debug!(tier = store.name(), pattern, removed, "entries invalidated"),
                Err(e) => warn!(tier = store.name(), pattern, error = %e, "pattern delete failed"),
            }
        }

        Ok(())
    }

    /// Number of live entries in the in-process tier
    pub async fn memory_len(&self) -> usize {
        self.memory.len().await
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }
}
