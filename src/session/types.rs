//! Session record and derived statistics types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One user session tracked by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user: String,
    pub start_time: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub tools_executed: u64,
    pub current_tier: u8,
    #[serde(default)]
    pub context: serde_json::Map<String, Value>,
}

impl SessionData {
    pub fn new(user: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user: user.into(),
            start_time: now,
            last_access: now,
            tools_executed: 0,
            current_tier: 1,
            context: serde_json::Map::new(),
        }
    }
}

/// Partial update applied to an existing session; `None` fields are left
/// untouched, a `Some` context replaces the whole map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub user: Option<String>,
    pub tools_executed: Option<u64>,
    pub current_tier: Option<u8>,
    pub context: Option<serde_json::Map<String, Value>>,
}

impl SessionUpdate {
    pub fn apply(self, session: &mut SessionData) {
        if let Some(user) = self.user {
            session.user = user;
        }
        if let Some(tools_executed) = self.tools_executed {
            session.tools_executed = tools_executed;
        }
        if let Some(current_tier) = self.current_tier {
            session.current_tier = current_tier;
        }
        if let Some(context) = self.context {
            session.context = context;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierDistribution {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
}

/// Aggregate view over all live sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_tools_executed: u64,
    pub average_tools_per_session: f64,
    pub tier_distribution: TierDistribution,
    pub oldest_session_start: Option<DateTime<Utc>>,
    pub newest_session_start: Option<DateTime<Utc>>,
}
