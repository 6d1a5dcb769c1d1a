//! Cache entry and TTL types
//!
//! An entry is valid iff `now < written_at + ttl_seconds`. Validity is
//! checked lazily at read time; expiry is advisory and never enforced by a
//! background sweep.

use crate::config::schema::{
    DEFAULT_DISTRIBUTED_TTL_SECS, DEFAULT_MEMORY_TTL_SECS, DEFAULT_PERSISTENT_TTL_SECS,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// A value held by the in-process tier; the remote tiers hold serialized copies
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Value,
    pub written_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(data: Value, ttl_seconds: u64) -> Self {
        Self {
            data,
            written_at: Utc::now(),
            ttl_seconds,
        }
    }

    /// True while the entry has not outlived its TTL
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.written_at + Duration::seconds(self.ttl_seconds as i64)
    }
}

/// Resolved per-tier TTLs, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub memory: u64,
    pub distributed: u64,
    pub persistent: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            memory: DEFAULT_MEMORY_TTL_SECS,
            distributed: DEFAULT_DISTRIBUTED_TTL_SECS,
            persistent: DEFAULT_PERSISTENT_TTL_SECS,
        }
    }
}

/// Per-operation TTL overrides; unset fields fall back to the manager defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    pub memory_ttl: Option<u64>,
    pub distributed_ttl: Option<u64>,
    pub persistent_ttl: Option<u64>,
}

impl CacheOptions {
    pub fn merged_with(&self, defaults: CacheTtls) -> CacheTtls {
        CacheTtls {
            memory: self.memory_ttl.unwrap_or(defaults.memory),
            distributed: self.distributed_ttl.unwrap_or(defaults.distributed),
            persistent: self.persistent_ttl.unwrap_or(defaults.persistent),
        }
    }
}
