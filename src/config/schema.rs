use crate::config::access::AccessControl;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default TTLs ascend with tier slowness so that a refresh in the
/// authoritative persistent tier is never masked indefinitely by a stale
/// fast-tier copy.
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 60;
pub const DEFAULT_DISTRIBUTED_TTL_SECS: u64 = 3600;
pub const DEFAULT_PERSISTENT_TTL_SECS: u64 = 86_400;

pub const DEFAULT_KEY_PREFIX: &str = "flowgate";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Top-level namespace prefix for all cache keys
    pub key_prefix: String,

    /// Default TTL for the in-process cache tier, in seconds
    pub memory_ttl_secs: u64,

    /// Default TTL for the distributed KV tier, in seconds
    pub distributed_ttl_secs: u64,

    /// Default TTL for the persistent tier, in seconds
    pub persistent_ttl_secs: u64,

    /// Base URL of the distributed KV store; the tier is skipped when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kv_endpoint: Option<String>,

    /// Bearer token for the distributed KV store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kv_api_token: Option<String>,

    /// Path of the SQLite database backing the persistent tier and the
    /// coordinator durable storage; defaults to ~/.flowgate/flowgate.db
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Interval between expired-session sweeps, in seconds
    pub session_sweep_interval_secs: u64,

    /// Access control tables, constructed once and passed by reference
    pub access: AccessControl,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            memory_ttl_secs: DEFAULT_MEMORY_TTL_SECS,
            distributed_ttl_secs: DEFAULT_DISTRIBUTED_TTL_SECS,
            persistent_ttl_secs: DEFAULT_PERSISTENT_TTL_SECS,
            kv_endpoint: None,
            kv_api_token: None,
            database_path: None,
            session_sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            access: AccessControl::default(),
        }
    }
}
