//! Session coordinator
//!
//! A single coordinator owns every session record, so increments, tier
//! changes and context updates are serialized without locks. Each mutation
//! bumps `last_access` and writes the record through to durable storage; a
//! failed persist is logged and the in-memory copy kept, so the worst case
//! is a stale durable record, not a lost update.
//!
//! Sessions idle for more than 24 hours are removed by the periodic sweep.

use crate::coordination::{Coordinator, CoordinatorHandle, DurableStore, spawn};
use crate::error::Result;
use crate::session::types::{SessionData, SessionStats, SessionUpdate, TierDistribution};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SESSION_TTL_HOURS: i64 = 24;
const STORAGE_PREFIX: &str = "session:";

pub enum SessionCommand {
    GetOrCreate {
        session_id: String,
        user: String,
        reply: oneshot::Sender<SessionData>,
    },
    Update {
        session_id: String,
        update: SessionUpdate,
        reply: oneshot::Sender<SessionData>,
    },
    IncrementToolCount {
        session_id: String,
        reply: oneshot::Sender<u64>,
    },
    CurrentTier {
        session_id: String,
        reply: oneshot::Sender<u8>,
    },
    UpdateTier {
        session_id: String,
        tier: u8,
        reply: oneshot::Sender<SessionData>,
    },
    UpdateContext {
        session_id: String,
        entries: serde_json::Map<String, Value>,
        reply: oneshot::Sender<SessionData>,
    },
    CleanExpired {
        reply: oneshot::Sender<usize>,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

pub struct SessionCoordinator {
    sessions: HashMap<String, SessionData>,
    durable: Arc<dyn DurableStore>,
}

impl SessionCoordinator {
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            sessions: HashMap::new(),
            durable,
        }
    }

    fn storage_key(session_id: &str) -> String {
        format!("{STORAGE_PREFIX}{session_id}")
    }

    async fn persist(&self, session_id: &str, session: &SessionData) {
        let value = match serde_json::to_value(session) {
            Ok(value) => value,
            Err(e) => {
                warn!(session_id, error = %e, "session not serializable, skipping persist");
                return;
            }
        };
        if let Err(e) = self
            .durable
            .write(&Self::storage_key(session_id), &value)
            .await
        {
            warn!(session_id, error = %e, "session persist failed, keeping in-memory copy");
        }
    }

    /// Load the session from memory or durable storage, creating it if it
    /// exists in neither. Ops that reach a missing session materialize one
    /// so they always have a record to act on.
    async fn ensure(&mut self, session_id: &str, user: &str) -> SessionData {
        if let Some(session) = self.sessions.get(session_id) {
            return session.clone();
        }

        if let Ok(Some(value)) = self.durable.read(&Self::storage_key(session_id)).await {
            match serde_json::from_value::<SessionData>(value) {
                Ok(session) => {
                    debug!(session_id, "session rehydrated from durable storage");
                    self.sessions.insert(session_id.to_string(), session.clone());
                    return session;
                }
                Err(e) => {
                    warn!(session_id, error = %e, "durable session unparseable, recreating");
                }
            }
        }

        let session = SessionData::new(user);
        self.sessions.insert(session_id.to_string(), session.clone());
        self.persist(session_id, &session).await;
        debug!(session_id, user, "session created");
        session
    }

    async fn mutate(
        &mut self,
        session_id: &str,
        user: &str,
        f: impl FnOnce(&mut SessionData),
    ) -> SessionData {
        let mut session = self.ensure(session_id, user).await;
        f(&mut session);
        session.last_access = Utc::now();
        self.sessions.insert(session_id.to_string(), session.clone());
        self.persist(session_id, &session).await;
        session
    }

    async fn clean_expired(&mut self) -> usize {
        let cutoff = Utc::now() - Duration::hours(SESSION_TTL_HOURS);
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.last_access < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &expired {
            self.sessions.remove(session_id);
            if let Err(e) = self.durable.delete(&Self::storage_key(session_id)).await {
                warn!(session_id, error = %e, "expired session durable delete failed");
            }
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "expired sessions cleaned");
        }
        expired.len()
    }

    fn stats(&self) -> SessionStats {
        let mut distribution = TierDistribution::default();
        let mut total_tools = 0u64;
        let mut oldest = None;
        let mut newest = None;

        for session in self.sessions.values() {
            total_tools += session.tools_executed;
            match session.current_tier {
                1 => distribution.tier1 += 1,
                2 => distribution.tier2 += 1,
                _ => distribution.tier3 += 1,
            }
            if oldest.is_none_or(|t| session.start_time < t) {
                oldest = Some(session.start_time);
            }
            if newest.is_none_or(|t| session.start_time > t) {
                newest = Some(session.start_time);
            }
        }

        let active = self.sessions.len();
        SessionStats {
            active_sessions: active,
            total_tools_executed: total_tools,
            average_tools_per_session: if active == 0 {
                0.0
            } else {
                total_tools as f64 / active as f64
            },
            tier_distribution: distribution,
            oldest_session_start: oldest,
            newest_session_start: newest,
        }
    }

    async fn reset(&mut self) {
        self.sessions.clear();
        if let Err(e) = self.durable.clear().await {
            warn!(error = %e, "durable storage clear failed during reset");
        }
        info!("session coordinator reset");
    }
}

#[async_trait]
impl Coordinator for SessionCoordinator {
    type Command = SessionCommand;

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::GetOrCreate {
                session_id,
                user,
                reply,
            } => {
                let session = self
                    .mutate(&session_id, &user, |_| {})
                    .await;
                let _ = reply.send(session);
            }
            SessionCommand::Update {
                session_id,
                update,
                reply,
            } => {
                let session = self
                    .mutate(&session_id, "unknown", |s| update.apply(s))
                    .await;
                let _ = reply.send(session);
            }
            SessionCommand::IncrementToolCount { session_id, reply } => {
                let session = self
                    .mutate(&session_id, "unknown", |s| s.tools_executed += 1)
                    .await;
                let _ = reply.send(session.tools_executed);
            }
            SessionCommand::CurrentTier { session_id, reply } => {
                let session = self.ensure(&session_id, "unknown").await;
                let _ = reply.send(session.current_tier);
            }
            SessionCommand::UpdateTier {
                session_id,
                tier,
                reply,
            } => {
                let session = self
                    .mutate(&session_id, "unknown", |s| s.current_tier = tier)
                    .await;
                let _ = reply.send(session);
            }
            SessionCommand::UpdateContext {
                session_id,
                entries,
                reply,
            } => {
                // Whole patch lands in one serialized mutation and one persist
                let session = self
                    .mutate(&session_id, "unknown", |s| {
                        for (key, value) in entries {
                            s.context.insert(key, value);
                        }
                    })
                    .await;
                let _ = reply.send(session);
            }
            SessionCommand::CleanExpired { reply } => {
                let removed = self.clean_expired().await;
                let _ = reply.send(removed);
            }
            SessionCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            SessionCommand::Reset { reply } => {
                self.reset().await;
                let _ = reply.send(());
            }
        }
    }
}

/// Typed client for the session coordinator
#[derive(Clone)]
pub struct SessionHandle {
    inner: CoordinatorHandle<SessionCommand>,
}

impl SessionHandle {
    pub fn spawn(durable: Arc<dyn DurableStore>) -> (Self, JoinHandle<()>) {
        let (inner, task) = spawn(SessionCoordinator::new(durable));
        (Self { inner }, task)
    }

    pub async fn get_or_create(&self, session_id: &str, user: &str) -> Result<SessionData> {
        let session_id = session_id.to_string();
        let user = user.to_string();
        self.inner
            .call(|reply| SessionCommand::GetOrCreate {
                session_id,
                user,
                reply,
            })
            .await
    }

    pub async fn update(&self, session_id: &str, update: SessionUpdate) -> Result<SessionData> {
        let session_id = session_id.to_string();
        self.inner
            .call(|reply| SessionCommand::Update {
                session_id,
                update,
                reply,
            })
            .await
    }

    /// Returns the count after the increment
    pub async fn increment_tool_count(&self, session_id: &str) -> Result<u64> {
        let session_id = session_id.to_string();
        self.inner
            .call(|reply| SessionCommand::IncrementToolCount { session_id, reply })
            .await
    }

    pub async fn current_tier(&self, session_id: &str) -> Result<u8> {
        let session_id = session_id.to_string();
        self.inner
            .call(|reply| SessionCommand::CurrentTier { session_id, reply })
            .await
    }

    pub async fn update_tier(&self, session_id: &str, tier: u8) -> Result<SessionData> {
        let session_id = session_id.to_string();
        self.inner
            .call(|reply| SessionCommand::UpdateTier {
                session_id,
                tier,
                reply,
            })
            .await
    }

    /// Shallow-merge the entries into the session context; existing keys not
    /// in the patch are kept
    pub async fn update_context(
        &self,
        session_id: &str,
        entries: serde_json::Map<String, Value>,
    ) -> Result<SessionData> {
        let session_id = session_id.to_string();
        self.inner
            .call(|reply| SessionCommand::UpdateContext {
                session_id,
                entries,
                reply,
            })
            .await
    }

    /// Returns how many idle sessions were removed
    pub async fn clean_expired(&self) -> Result<usize> {
        self.inner
            .call(|reply| SessionCommand::CleanExpired { reply })
            .await
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        self.inner.call(|reply| SessionCommand::Stats { reply }).await
    }

    /// Drops every session, in memory and durable
    pub async fn reset(&self) -> Result<()> {
        self.inner.call(|reply| SessionCommand::Reset { reply }).await
    }
}
