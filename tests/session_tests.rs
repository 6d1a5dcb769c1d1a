//! Integration tests for the session coordinator through its public handle.

use flowgate::coordination::MemoryDurableStore;
use flowgate::session::{SessionHandle, SessionUpdate};
use serde_json::json;
use std::sync::Arc;

fn spawn_sessions() -> (SessionHandle, MemoryDurableStore) {
    let durable = MemoryDurableStore::new();
    let (handle, _task) = SessionHandle::spawn(Arc::new(durable.clone()));
    (handle, durable)
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let (sessions, _) = spawn_sessions();

    let first = sessions.get_or_create("s1", "alice").await.unwrap();
    let second = sessions.get_or_create("s1", "alice").await.unwrap();

    assert_eq!(first.user, "alice");
    assert_eq!(first.start_time, second.start_time);
    assert_eq!(second.tools_executed, 0);
}

#[tokio::test]
async fn sequential_increments_count_exactly() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();

    for expected in 1..=5 {
        let count = sessions.increment_tool_count("s1").await.unwrap();
        assert_eq!(count, expected);
    }
}

#[tokio::test]
async fn concurrent_increments_never_lose_updates() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let sessions = sessions.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                sessions.increment_tool_count("s1").await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let session = sessions.get_or_create("s1", "alice").await.unwrap();
    assert_eq!(session.tools_executed, 30);
}

#[tokio::test]
async fn session_rehydrates_from_durable_storage() {
    let durable = MemoryDurableStore::new();
    durable
        .seed(
            "session:abc",
            json!({
                "user": "bob",
                "start_time": "2026-08-01T00:00:00Z",
                "last_access": "2026-08-29T00:00:00Z",
                "tools_executed": 17,
                "current_tier": 2,
                "context": {"project": "demo"}
            }),
        )
        .await;

    let (sessions, _task) = SessionHandle::spawn(Arc::new(durable));
    let session = sessions.get_or_create("abc", "ignored").await.unwrap();

    assert_eq!(session.user, "bob");
    assert_eq!(session.tools_executed, 17);
    assert_eq!(session.current_tier, 2);
    assert_eq!(session.context.get("project"), Some(&json!("demo")));
}

#[tokio::test]
async fn tier_updates_are_visible_to_reads() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();

    assert_eq!(sessions.current_tier("s1").await.unwrap(), 1);
    sessions.update_tier("s1", 3).await.unwrap();
    assert_eq!(sessions.current_tier("s1").await.unwrap(), 3);
}

fn context_patch(entries: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[tokio::test]
async fn update_context_merges_multiple_keys_in_one_call() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();

    let session = sessions
        .update_context("s1", context_patch(&[("a", json!(1)), ("b", json!(2))]))
        .await
        .unwrap();

    assert_eq!(session.context.get("a"), Some(&json!(1)));
    assert_eq!(session.context.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn update_context_keeps_keys_absent_from_the_patch() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();
    sessions
        .update_context("s1", context_patch(&[("keep", json!("old")), ("swap", json!(1))]))
        .await
        .unwrap();

    let session = sessions
        .update_context("s1", context_patch(&[("swap", json!(2))]))
        .await
        .unwrap();

    assert_eq!(session.context.get("keep"), Some(&json!("old")));
    assert_eq!(session.context.get("swap"), Some(&json!(2)));
}

#[tokio::test]
async fn update_replaces_context_wholesale() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();
    sessions
        .update_context("s1", context_patch(&[("old", json!(true))]))
        .await
        .unwrap();

    let mut context = serde_json::Map::new();
    context.insert("new".to_string(), json!(1));
    let session = sessions
        .update(
            "s1",
            SessionUpdate {
                context: Some(context),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!session.context.contains_key("old"));
    assert!(session.context.contains_key("new"));
}

#[tokio::test]
async fn stats_aggregate_across_sessions() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("a", "u1").await.unwrap();
    sessions.get_or_create("b", "u2").await.unwrap();
    sessions.increment_tool_count("a").await.unwrap();
    sessions.increment_tool_count("a").await.unwrap();
    sessions.update_tier("b", 2).await.unwrap();

    let stats = sessions.stats().await.unwrap();
    assert_eq!(stats.active_sessions, 2);
    assert_eq!(stats.total_tools_executed, 2);
    assert!((stats.average_tools_per_session - 1.0).abs() < f64::EPSILON);
    assert_eq!(stats.tier_distribution.tier1, 1);
    assert_eq!(stats.tier_distribution.tier2, 1);
}

#[tokio::test]
async fn reset_wipes_memory_and_durable_state() {
    let (sessions, durable) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();
    assert!(durable.contains("session:s1").await);

    sessions.reset().await.unwrap();
    assert!(durable.is_empty().await);

    let stats = sessions.stats().await.unwrap();
    assert_eq!(stats.active_sessions, 0);
}

#[tokio::test]
async fn clean_expired_leaves_fresh_sessions() {
    let (sessions, _) = spawn_sessions();
    sessions.get_or_create("s1", "alice").await.unwrap();
    // Everything was touched just now, so nothing qualifies
    assert_eq!(sessions.clean_expired().await.unwrap(), 0);
}
