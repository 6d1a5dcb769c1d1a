//! Uniform contract for the remote cache tiers
//!
//! The distributed and persistent tiers fail independently; every method
//! returns a `Result` and the cache manager degrades a failed call to a miss
//! or no-op for that tier only.

use crate::cache::pattern::KeyPattern;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TierStore: Send + Sync {
    /// Stable tier label used in logs ("distributed", "persistent")
    fn name(&self) -> &'static str;

    /// Fetch the serialized payload stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a serialized payload with the tier's TTL semantics
    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// Delete a single key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key the pattern matches, returning the count removed
    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<u64>;
}
