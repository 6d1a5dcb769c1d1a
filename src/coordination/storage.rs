//! Durable backing storage for coordinators
//!
//! A coordinator's in-memory state is the working copy; the durable store is
//! what survives restarts. Each coordinator gets its own table so one
//! coordinator's `clear` cannot touch another's rows.

use crate::db;
use crate::error::{FlowgateError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Value>>;
    async fn write(&self, key: &str, value: &Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// SQLite-backed durable storage, one table per coordinator
#[derive(Debug, Clone)]
pub struct SqliteDurableStore {
    pool: SqlitePool,
    table: &'static str,
}

impl SqliteDurableStore {
    /// `table` must be a trusted identifier; it is interpolated into SQL.
    pub async fn open(pool: SqlitePool, table: &'static str) -> Result<Self> {
        let schema = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n\
             key        TEXT PRIMARY KEY NOT NULL,\n\
             value      TEXT NOT NULL,\n\
             updated_at INTEGER NOT NULL\n\
             ) WITHOUT ROWID;"
        );
        sqlx::query(&schema)
            .execute(&pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable("sqlite", e))?;
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl DurableStore for SqliteDurableStore {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let query = format!("SELECT value FROM {} WHERE key = ?1", self.table);
        let row = sqlx::query(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable("sqlite", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row
            .try_get("value")
            .map_err(|e| FlowgateError::tier_unreachable("sqlite", e))?;
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(table = self.table, key, error = %e,
                      "stored record unparseable, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        let query = format!(
            "INSERT OR REPLACE INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)",
            self.table
        );
        sqlx::query(&query)
            .bind(key)
            .bind(value.to_string())
            .bind(db::now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| FlowgateError::persistence_write(key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE key = ?1", self.table);
        sqlx::query(&query)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable("sqlite", e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let query = format!("DELETE FROM {}", self.table);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| FlowgateError::tier_unreachable("sqlite", e))?;
        Ok(())
    }
}

/// In-memory durable storage for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryDurableStore {
    records: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, key: &str, value: Value) {
        self.records.write().await.insert(key.to_string(), value);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.records.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let pool = db::open_in_memory().await.unwrap();
        let store = SqliteDurableStore::open(pool, "sessions").await.unwrap();

        store.write("session:a", &json!({"user": "u"})).await.unwrap();
        assert_eq!(
            store.read("session:a").await.unwrap(),
            Some(json!({"user": "u"}))
        );
    }

    #[tokio::test]
    async fn test_sqlite_tables_are_isolated() {
        let pool = db::open_in_memory().await.unwrap();
        let sessions = SqliteDurableStore::open(pool.clone(), "sessions")
            .await
            .unwrap();
        let registry = SqliteDurableStore::open(pool, "tier_registry")
            .await
            .unwrap();

        sessions.write("k", &json!(1)).await.unwrap();
        registry.write("k", &json!(2)).await.unwrap();
        sessions.clear().await.unwrap();

        assert_eq!(sessions.read("k").await.unwrap(), None);
        assert_eq!(registry.read("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_sqlite_write_replaces() {
        let pool = db::open_in_memory().await.unwrap();
        let store = SqliteDurableStore::open(pool, "sessions").await.unwrap();

        store.write("k", &json!(1)).await.unwrap();
        store.write("k", &json!(2)).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = MemoryDurableStore::new();
        store.write("a", &json!(1)).await.unwrap();
        store.write("b", &json!(2)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
