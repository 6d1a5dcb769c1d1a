//! Audit trail for gateway dispatches
//!
//! Every dispatch produces exactly one record: denied, failed, or succeeded.
//! Sinks are fire-and-forget; a slow or broken sink must never block the
//! dispatch path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Denied,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub user: String,
    pub tool: String,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
    /// Outcome-specific detail: cache hit flag, denial reason, error message
    pub detail: Value,
}

impl AuditRecord {
    pub fn new(user: &str, tool: &str, outcome: AuditOutcome, detail: Value) -> Self {
        Self {
            user: user.to_string(),
            tool: tool.to_string(),
            outcome,
            timestamp: Utc::now(),
            detail,
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Default sink: structured log lines, denials and failures at warn
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) {
        match record.outcome {
            AuditOutcome::Success => {
                info!(
                    user = %record.user,
                    tool = %record.tool,
                    detail = %record.detail,
                    "tool dispatch succeeded"
                );
            }
            AuditOutcome::Denied => {
                warn!(
                    user = %record.user,
                    tool = %record.tool,
                    detail = %record.detail,
                    "tool dispatch denied"
                );
            }
            AuditOutcome::Failure => {
                warn!(
                    user = %record.user,
                    tool = %record.tool,
                    detail = %record.detail,
                    "tool dispatch failed"
                );
            }
        }
    }
}
