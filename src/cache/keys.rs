//! Deterministic cache key generation
//!
//! Keys are namespaced `prefix:kind:identifier[:qualifier]` strings. The
//! entity kind is always part of the key, so distinct kinds never collide
//! even with identical identifiers. No I/O, no state.

use serde_json::Value;

pub const KEY_DELIMITER: char = ':';

#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Key for workflow data, optionally pinned to a version
    pub fn workflow(&self, id: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}:workflow:{}:{}", self.prefix, id, version),
            None => format!("{}:workflow:{}", self.prefix, id),
        }
    }

    /// Key for node metadata
    pub fn node(&self, name: &str) -> String {
        format!("{}:node:{}", self.prefix, name)
    }

    /// Key for execution data
    pub fn execution(&self, id: &str) -> String {
        format!("{}:execution:{}", self.prefix, id)
    }

    /// Key for credential metadata
    pub fn credential(&self, id: &str) -> String {
        format!("{}:credential:{}", self.prefix, id)
    }

    /// Key for a tool tier's member list
    pub fn tool_tier(&self, tier: u8) -> String {
        format!("{}:tools:tier{}", self.prefix, tier)
    }

    /// Key for search results; the query is lowercased and whitespace runs
    /// collapse to a single underscore
    pub fn search(&self, query: &str, kind: &str) -> String {
        let sanitized = query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        format!("{}:search:{}:{}", self.prefix, kind, sanitized)
    }

    /// Key for a cached tool result, derived from the tool name and its
    /// compact JSON arguments
    pub fn tool_result(&self, tool: &str, args: &Value) -> String {
        format!("{}:tool:{}:{}", self.prefix, tool, args)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(crate::config::schema::DEFAULT_KEY_PREFIX)
    }
}
