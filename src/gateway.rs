//! Gateway daemon and tool dispatch
//!
//! The gateway is the single entry point for tool execution: it checks
//! permissions, resolves the session, consults the cache, runs the tool
//! handler on a miss, and writes an audit record for every dispatch. The
//! daemon form wires the cache tiers and coordinators together, runs the
//! periodic session sweep, and handles SIGTERM/SIGINT for graceful shutdown.

use crate::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::cache::{CacheManager, CacheOptions, CacheTtls, HttpKvStore, KeyGenerator, SqlCacheStore};
use crate::config::{Config, loader};
use crate::coordination::SqliteDurableStore;
use crate::db;
use crate::error::{FlowgateError, Result};
use crate::registry::RegistryHandle;
use crate::session::SessionHandle;
use anyhow::Context;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// TTL overrides for cached tool results: short-lived in memory, a few
/// minutes in the distributed tier. The persistent tier keeps its default
/// TTL; writes still fan out to every configured tier.
const TOOL_RESULT_MEMORY_TTL_SECS: u64 = 60;
const TOOL_RESULT_DISTRIBUTED_TTL_SECS: u64 = 300;

/// In-process TTL override for pre-warmed tier tool lists
const TIER_LIST_MEMORY_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: String,
    pub session_id: String,
    pub user: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub result: Value,
    /// True when the result was served from the cache without executing
    pub cached: bool,
}

/// A tool the gateway can dispatch to
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, args: &Value) -> Result<Value>;
}

pub struct Gateway {
    access: crate::config::AccessControl,
    cache: Arc<CacheManager>,
    keys: KeyGenerator,
    sessions: SessionHandle,
    registry: RegistryHandle,
    audit: Arc<dyn AuditSink>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl Gateway {
    pub fn new(
        access: crate::config::AccessControl,
        cache: Arc<CacheManager>,
        keys: KeyGenerator,
        sessions: SessionHandle,
        registry: RegistryHandle,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            access,
            cache,
            keys,
            sessions,
            registry,
            audit,
            handlers: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionHandle {
        &self.sessions
    }

    /// Full dispatch path: permission check, session resolution, cache
    /// lookup, execution on miss, audit record. Exactly one audit record is
    /// written per call, whatever the outcome.
    pub async fn dispatch(&self, invocation: ToolInvocation) -> Result<ToolOutcome> {
        let ToolInvocation {
            tool,
            session_id,
            user,
            args,
        } = invocation;

        if !self.access.check_permission(&user, &tool) {
            self.audit
                .record(AuditRecord::new(
                    &user,
                    &tool,
                    AuditOutcome::Denied,
                    json!({"reason": "insufficient permission"}),
                ))
                .await;
            return Err(FlowgateError::PermissionDenied { user, tool });
        }

        let Some(handler) = self.handlers.get(&tool) else {
            self.audit
                .record(AuditRecord::new(
                    &user,
                    &tool,
                    AuditOutcome::Failure,
                    json!({"reason": "unknown tool"}),
                ))
                .await;
            return Err(FlowgateError::ToolNotFound(tool));
        };

        self.sessions.get_or_create(&session_id, &user).await?;

        let cache_key = self.keys.tool_result(&tool, &args);
        if let Some(result) = self.cache.get::<Value>(&cache_key).await {
            debug!(tool = %tool, "tool result served from cache");
            self.record_success(&session_id, &user, &tool, true).await;
            return Ok(ToolOutcome {
                result,
                cached: true,
            });
        }

        let result = match handler.execute(&args).await {
            Ok(result) => result,
            Err(e) => {
                self.audit
                    .record(AuditRecord::new(
                        &user,
                        &tool,
                        AuditOutcome::Failure,
                        json!({"error": e.to_string()}),
                    ))
                    .await;
                return Err(e);
            }
        };

        self.cache
            .set(
                &cache_key,
                &result,
                Some(CacheOptions {
                    memory_ttl: Some(TOOL_RESULT_MEMORY_TTL_SECS),
                    distributed_ttl: Some(TOOL_RESULT_DISTRIBUTED_TTL_SECS),
                    persistent_ttl: None,
                }),
            )
            .await;

        self.record_success(&session_id, &user, &tool, false).await;
        Ok(ToolOutcome {
            result,
            cached: false,
        })
    }

    async fn record_success(&self, session_id: &str, user: &str, tool: &str, cached: bool) {
        if let Err(e) = self.sessions.increment_tool_count(session_id).await {
            warn!(session_id, error = %e, "tool count increment failed");
        }
        self.audit
            .record(AuditRecord::new(
                user,
                tool,
                AuditOutcome::Success,
                json!({"cached": cached}),
            ))
            .await;
    }
}

/// Pre-populate the cache with the tool list for each tier, so early
/// lookups skip the registry round-trip. Writes go through the normal
/// fan-out, so configured remote tiers receive the lists too.
pub async fn warm_tier_lists(
    cache: &CacheManager,
    keys: &KeyGenerator,
    registry: &RegistryHandle,
) -> Result<()> {
    for tier in 1..=3u8 {
        let tools = registry.tools_for_tier(tier).await?;
        cache
            .set(
                &keys.tool_tier(tier),
                &tools,
                Some(CacheOptions {
                    memory_ttl: Some(TIER_LIST_MEMORY_TTL_SECS),
                    distributed_ttl: None,
                    persistent_ttl: None,
                }),
            )
            .await;
    }
    debug!("tier tool lists warmed");
    Ok(())
}

/// Periodic sweep of idle sessions.
///
/// Returns a JoinHandle for graceful shutdown coordination and a shutdown
/// sender.
pub fn start_sweep_task(
    sessions: SessionHandle,
    interval_secs: u64,
) -> (JoinHandle<()>, mpsc::Sender<()>) {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
        // First tick fires immediately; skip it so startup is not a sweep
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match sessions.clean_expired().await {
                        Ok(removed) if removed > 0 => {
                            info!(removed, "session sweep removed idle sessions");
                        }
                        Ok(_) => {
                            debug!("session sweep found nothing to remove");
                        }
                        Err(e) => {
                            error!("Session sweep failed: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Sweep task received shutdown signal, completing...");
                    break;
                }
            }
        }
    });

    (handle, shutdown_tx)
}

/// Runs the gateway daemon with graceful shutdown.
///
/// This function:
/// 1. Builds the cache tiers from configuration (memory always, distributed
///    and persistent when configured)
/// 2. Spawns the session and tier registry coordinators
/// 3. Warms the tier tool lists
/// 4. Starts the periodic session sweep
/// 5. Handles SIGTERM/SIGINT for graceful shutdown
pub async fn run_gateway(config: &Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting flowgate gateway daemon"
    );

    let ttls = CacheTtls {
        memory: config.memory_ttl_secs,
        distributed: config.distributed_ttl_secs,
        persistent: config.persistent_ttl_secs,
    };
    let mut cache = CacheManager::new(ttls);

    if let Some(endpoint) = &config.kv_endpoint {
        cache = cache.with_distributed(Arc::new(HttpKvStore::new(
            endpoint.clone(),
            config.kv_api_token.clone(),
        )));
        info!(endpoint = %endpoint, "Distributed cache tier configured");
    } else {
        info!("No KV endpoint configured, distributed tier disabled");
    }

    let database_path = match &config.database_path {
        Some(path) => path.clone(),
        None => loader::default_database_path().context("Could not determine database path")?,
    };
    let pool = db::open_pool(&database_path)
        .await
        .with_context(|| format!("Failed to open database at {:?}", database_path))?;

    cache = cache.with_persistent(Arc::new(
        SqlCacheStore::with_pool(pool.clone())
            .await
            .context("Failed to initialize persistent cache tier")?,
    ));
    info!(path = ?database_path, "Persistent cache tier configured");

    let cache = Arc::new(cache);

    let session_store = SqliteDurableStore::open(pool.clone(), "sessions")
        .await
        .context("Failed to initialize session storage")?;
    let registry_store = SqliteDurableStore::open(pool, "tier_registry")
        .await
        .context("Failed to initialize tier registry storage")?;

    let (sessions, session_task) = SessionHandle::spawn(Arc::new(session_store));
    let (registry, registry_task) = RegistryHandle::spawn(Arc::new(registry_store));
    info!("Session and tier registry coordinators started");

    let keys = KeyGenerator::new(&config.key_prefix);
    warm_tier_lists(&cache, &keys, &registry)
        .await
        .context("Failed to warm tier tool lists")?;

    let (sweep_handle, sweep_shutdown) =
        start_sweep_task(sessions.clone(), config.session_sweep_interval_secs);
    info!(
        interval_secs = config.session_sweep_interval_secs,
        "Session sweep background task started"
    );

    // Create shutdown channel for coordination
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let shutdown_tx_signal = shutdown_tx.clone();

    // Spawn signal handler task for SIGTERM and SIGINT
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to setup SIGTERM handler: {}", e);
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to setup SIGINT handler: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown...");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown...");
                }
            }
        }
        #[cfg(not(unix))]
        {
            use tokio::signal;
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                }
                Err(e) => {
                    error!("Failed to listen for shutdown signal: {}", e);
                    return;
                }
            }
        }
        let _ = shutdown_tx_signal.send(()).await;
    });

    info!("Gateway daemon is running. Press Ctrl+C to stop.");

    let _ = shutdown_rx.recv().await;
    info!("Shutdown signal received, starting graceful shutdown...");

    // Signal sweep task to stop and wait with a timeout
    let _ = sweep_shutdown.send(()).await;
    let timeout_duration = std::time::Duration::from_secs(5);
    match tokio::time::timeout(timeout_duration, sweep_handle).await {
        Ok(Ok(())) => {
            info!("Sweep task completed gracefully");
        }
        Ok(Err(e)) => {
            error!("Sweep task panicked: {}", e);
        }
        Err(_) => {
            error!("Sweep task did not complete within 5s timeout");
        }
    }

    // Dropping the handles closes the coordinator mailboxes
    drop(sessions);
    drop(registry);
    match tokio::time::timeout(timeout_duration, session_task).await {
        Ok(Ok(())) => info!("Session coordinator stopped"),
        Ok(Err(e)) => error!("Session coordinator panicked: {}", e),
        Err(_) => error!("Session coordinator did not stop within 5s timeout"),
    }
    match tokio::time::timeout(timeout_duration, registry_task).await {
        Ok(Ok(())) => info!("Tier registry coordinator stopped"),
        Ok(Err(e)) => error!("Tier registry coordinator panicked: {}", e),
        Err(_) => error!("Tier registry coordinator did not stop within 5s timeout"),
    }

    info!("Gateway daemon stopped gracefully");
    Ok(())
}
