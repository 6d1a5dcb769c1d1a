//! Integration tests for the gateway dispatch path: permissions, caching,
//! session accounting and the audit trail.

use async_trait::async_trait;
use flowgate::audit::{AuditOutcome, AuditRecord, AuditSink};
use flowgate::cache::{CacheManager, CacheTtls, KeyGenerator};
use flowgate::config::AccessControl;
use flowgate::coordination::MemoryDurableStore;
use flowgate::error::{FlowgateError, Result};
use flowgate::gateway::{Gateway, ToolHandler, ToolInvocation, warm_tier_lists};
use flowgate::registry::RegistryHandle;
use flowgate::session::SessionHandle;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Handler double that counts executions
struct EchoTool {
    name: String,
    executions: AtomicUsize,
}

impl EchoTool {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            executions: AtomicUsize::new(0),
        })
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, args: &Value) -> Result<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"echo": args}))
    }
}

struct FailingTool;

#[async_trait]
impl ToolHandler for FailingTool {
    fn name(&self) -> &str {
        "workflow.execute"
    }

    async fn execute(&self, _args: &Value) -> Result<Value> {
        Err(FlowgateError::tool_failed("workflow.execute", "upstream 500"))
    }
}

/// Sink double collecting every record
#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl CollectingSink {
    async fn outcomes(&self) -> Vec<AuditOutcome> {
        self.records.lock().await.iter().map(|r| r.outcome).collect()
    }
}

#[async_trait]
impl AuditSink for CollectingSink {
    async fn record(&self, record: AuditRecord) {
        self.records.lock().await.push(record);
    }
}

fn test_access() -> AccessControl {
    let mut access = AccessControl::default();
    access.authorized_users.insert("alice".to_string());
    access.authorized_users.insert("dep".to_string());
    access.deployment_users.insert("dep".to_string());
    access
}

fn build_gateway() -> (Gateway, Arc<CollectingSink>) {
    let cache = Arc::new(CacheManager::new(CacheTtls::default()));
    let (sessions, _session_task) = SessionHandle::spawn(Arc::new(MemoryDurableStore::new()));
    let (registry, _registry_task) = RegistryHandle::spawn(Arc::new(MemoryDurableStore::new()));
    let sink = Arc::new(CollectingSink::default());

    let gateway = Gateway::new(
        test_access(),
        cache,
        KeyGenerator::new("test"),
        sessions,
        registry,
        sink.clone(),
    );
    (gateway, sink)
}

fn invocation(tool: &str, user: &str, args: Value) -> ToolInvocation {
    ToolInvocation {
        tool: tool.to_string(),
        session_id: "s1".to_string(),
        user: user.to_string(),
        args,
    }
}

#[tokio::test]
async fn dispatch_executes_then_serves_from_cache() {
    let (mut gateway, sink) = build_gateway();
    let tool = EchoTool::new("workflow.get");
    gateway.register_handler(tool.clone());

    let args = json!({"id": "7"});
    let first = gateway
        .dispatch(invocation("workflow.get", "alice", args.clone()))
        .await
        .unwrap();
    let second = gateway
        .dispatch(invocation("workflow.get", "alice", args))
        .await
        .unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.result, second.result);
    assert_eq!(tool.executions(), 1);
    assert_eq!(
        sink.outcomes().await,
        vec![AuditOutcome::Success, AuditOutcome::Success]
    );
}

#[tokio::test]
async fn different_args_do_not_share_cache_entries() {
    let (mut gateway, _) = build_gateway();
    let tool = EchoTool::new("workflow.get");
    gateway.register_handler(tool.clone());

    gateway
        .dispatch(invocation("workflow.get", "alice", json!({"id": "1"})))
        .await
        .unwrap();
    let other = gateway
        .dispatch(invocation("workflow.get", "alice", json!({"id": "2"})))
        .await
        .unwrap();

    assert!(!other.cached);
    assert_eq!(tool.executions(), 2);
}

#[tokio::test]
async fn denied_user_never_reaches_the_handler() {
    let (mut gateway, sink) = build_gateway();
    let tool = EchoTool::new("workflow.get");
    gateway.register_handler(tool.clone());

    let err = gateway
        .dispatch(invocation("workflow.get", "mallory", json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowgateError::PermissionDenied { .. }));
    assert_eq!(tool.executions(), 0);
    assert_eq!(sink.outcomes().await, vec![AuditOutcome::Denied]);
}

#[tokio::test]
async fn admin_tool_requires_deployment_membership() {
    let (mut gateway, _) = build_gateway();
    gateway.register_handler(EchoTool::new("credential.list"));

    let denied = gateway
        .dispatch(invocation("credential.list", "alice", json!({})))
        .await;
    assert!(matches!(
        denied,
        Err(FlowgateError::PermissionDenied { .. })
    ));

    let allowed = gateway
        .dispatch(invocation("credential.list", "dep", json!({})))
        .await;
    assert!(allowed.is_ok());
}

#[tokio::test]
async fn unknown_tool_is_audited_as_failure() {
    let (gateway, sink) = build_gateway();

    let err = gateway
        .dispatch(invocation("workflow.get", "alice", json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowgateError::ToolNotFound(_)));
    assert_eq!(sink.outcomes().await, vec![AuditOutcome::Failure]);
}

#[tokio::test]
async fn handler_failure_is_audited_and_not_cached() {
    let (mut gateway, sink) = build_gateway();
    gateway.register_handler(Arc::new(FailingTool));

    let err = gateway
        .dispatch(invocation("workflow.execute", "alice", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowgateError::ToolFailed { .. }));

    // A retry executes again rather than hitting a cached failure
    let err = gateway
        .dispatch(invocation("workflow.execute", "alice", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowgateError::ToolFailed { .. }));
    assert_eq!(
        sink.outcomes().await,
        vec![AuditOutcome::Failure, AuditOutcome::Failure]
    );
}

#[tokio::test]
async fn successful_dispatches_increment_the_session_count() {
    let (mut gateway, _) = build_gateway();
    gateway.register_handler(EchoTool::new("workflow.get"));

    gateway
        .dispatch(invocation("workflow.get", "alice", json!({"id": "1"})))
        .await
        .unwrap();
    gateway
        .dispatch(invocation("workflow.get", "alice", json!({"id": "1"})))
        .await
        .unwrap();

    let session = gateway.sessions().get_or_create("s1", "alice").await.unwrap();
    // Both the miss and the cached hit count as executions for the session
    assert_eq!(session.tools_executed, 2);
}

#[tokio::test]
async fn warming_populates_tier_list_keys() {
    let cache = CacheManager::new(CacheTtls::default());
    let keys = KeyGenerator::new("test");
    let (registry, _task) = RegistryHandle::spawn(Arc::new(MemoryDurableStore::new()));

    warm_tier_lists(&cache, &keys, &registry).await.unwrap();

    let tier1: Vec<String> = cache.get(&keys.tool_tier(1)).await.unwrap();
    assert!(tier1.contains(&"workflow.list".to_string()));
    assert_eq!(cache.memory_len().await, 3);
}
