//! Persistent cache tier backed by SQLite
//!
//! Slowest, shared, durable. Entries carry an explicit `expires_at`
//! timestamp (epoch millis) and reads filter on it; expired rows are left in
//! place for later overwrites rather than swept proactively.

use crate::cache::pattern::KeyPattern;
use crate::cache::store::TierStore;
use crate::db;
use crate::error::{FlowgateError, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

const TIER_NAME: &str = "persistent";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL
) WITHOUT ROWID;
"#;

#[derive(Debug, Clone)]
pub struct SqlCacheStore {
    pool: SqlitePool,
}

impl SqlCacheStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pool = db::open_pool(path.as_ref()).await?;
        Self::with_pool(pool).await
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = db::open_in_memory().await?;
        Self::with_pool(pool).await
    }

    /// Build on an existing pool, shared with the coordinator storage
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TierStore for SqlCacheStore {
    fn name(&self) -> &'static str {
        TIER_NAME
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM cache WHERE key = ?1 AND expires_at > ?2")
            .bind(key)
            .bind(db::now_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let now = db::now_millis();
        let expires_at = now + (ttl_seconds as i64) * 1000;
        sqlx::query(
            "INSERT OR REPLACE INTO cache (key, value, expires_at, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache WHERE key LIKE ?1 ESCAPE '\\'")
            .bind(pattern.to_like())
            .execute(&self.pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqlCacheStore::in_memory().await.unwrap();
        store.put("k", "\"v\"", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("\"v\"".to_string()));
    }

    #[tokio::test]
    async fn test_get_respects_expiry_timestamp() {
        let store = SqlCacheStore::in_memory().await.unwrap();
        store.put("k", "\"v\"", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_row() {
        let store = SqlCacheStore::in_memory().await.unwrap();
        store.put("k", "1", 60).await.unwrap();
        store.put("k", "2", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_noop() {
        let store = SqlCacheStore::in_memory().await.unwrap();
        store.delete("absent").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_matching_uses_like() {
        let store = SqlCacheStore::in_memory().await.unwrap();
        store.put("wf:1", "1", 60).await.unwrap();
        store.put("wf:2", "2", 60).await.unwrap();
        store.put("other:1", "3", 60).await.unwrap();

        let pattern = KeyPattern::compile("wf:*").unwrap();
        assert_eq!(store.delete_matching(&pattern).await.unwrap(), 2);
        assert_eq!(store.get("wf:1").await.unwrap(), None);
        assert_eq!(store.get("other:1").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_like_escape_prevents_wildcard_injection() {
        let store = SqlCacheStore::in_memory().await.unwrap();
        store.put("a_b", "1", 60).await.unwrap();
        store.put("axb", "2", 60).await.unwrap();

        // '_' in the pattern is literal, so only "a_b" may match
        let pattern = KeyPattern::compile("a_b").unwrap();
        assert_eq!(store.delete_matching(&pattern).await.unwrap(), 1);
        assert_eq!(store.get("axb").await.unwrap(), Some("2".to_string()));
    }
}
