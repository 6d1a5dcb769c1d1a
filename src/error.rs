//! Centralized error types for flowgate
//!
//! This module provides structured error types using `thiserror` for library code.
//! CLI/daemon entry points use `anyhow` for easy context.
//!
//! The cache and coordination layers are designed to fail open: a tier that is
//! unreachable or a payload that cannot be parsed degrades to a miss for that
//! tier only, and is never fatal to the calling gateway.

use std::path::PathBuf;
use thiserror::Error;

/// Global error type for flowgate operations
#[derive(Error, Debug)]
pub enum FlowgateError {
    /// A backing store is not configured or a call to it failed
    #[error("cache tier '{tier}' unreachable: {message}")]
    TierUnreachable { tier: &'static str, message: String },

    /// A stored payload could not be serialized or parsed back
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// A durable write during a coordinator mutation failed
    #[error("durable write failed for '{key}': {message}")]
    PersistenceWrite { key: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// An invalidation pattern failed to compile
    #[error("invalid key pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Coordinator mailbox or reply channel errors
    #[error("coordination channel error: {message}")]
    Channel { message: String },

    /// The user is not allowed to invoke the tool
    #[error("permission denied: user '{user}' may not call '{tool}'")]
    PermissionDenied { user: String, tool: String },

    /// No handler is registered under the requested tool name
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// A tool handler returned an error
    #[error("tool '{tool}' execution failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// IO errors with path context
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FlowgateError {
    /// Create a tier-unreachable error from any displayable cause
    pub fn tier_unreachable(tier: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::TierUnreachable {
            tier,
            message: cause.to_string(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a durable-write error
    pub fn persistence_write(key: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::PersistenceWrite {
            key: key.into(),
            message: cause.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a channel error
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// Create a tool-execution error
    pub fn tool_failed(tool: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: cause.to_string(),
        }
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error is recoverable (system can continue)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Tier failures degrade to a cache miss
            FlowgateError::TierUnreachable { .. } => true,
            // Unparseable payloads are treated as misses
            FlowgateError::Serialization { .. } => true,
            // In-memory state survives; the next successful write converges
            FlowgateError::PersistenceWrite { .. } => true,
            // IO errors might be transient
            FlowgateError::Io { .. } => true,
            // Tool handlers can be retried by the caller
            FlowgateError::ToolFailed { .. } => true,
            // Denials and unknown tools are terminal for the request
            FlowgateError::PermissionDenied { .. } => false,
            FlowgateError::ToolNotFound(_) => false,
            // A closed mailbox means the coordinator task is gone
            FlowgateError::Channel { .. } => false,
            // Config and pattern errors require operator action
            FlowgateError::Config { .. } => false,
            FlowgateError::InvalidPattern { .. } => false,
        }
    }
}

/// Result type alias using FlowgateError
pub type Result<T> = std::result::Result<T, FlowgateError>;

impl From<serde_json::Error> for FlowgateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for FlowgateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}
