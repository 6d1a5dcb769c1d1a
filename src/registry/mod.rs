//! Tier registry coordinator
//!
//! Owns the tool-to-tier assignment table. The table is loaded lazily from
//! durable storage on first use; if nothing is stored yet the built-in
//! defaults are seeded and persisted. Tiers are ordered ascending, so
//! "tools up to tier N" concatenates tiers 1..=N in order.

use crate::coordination::{Coordinator, CoordinatorHandle, DurableStore, spawn};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const STORAGE_KEY: &str = "tiers";

type TierTable = BTreeMap<u8, Vec<String>>;

/// Built-in assignment: tier 1 covers routine workflow operations, tier 2
/// structural changes, tier 3 credential and environment access.
fn default_tiers() -> TierTable {
    let tier = |tools: &[&str]| tools.iter().map(|t| t.to_string()).collect();
    BTreeMap::from([
        (
            1,
            tier(&[
                "workflow.list",
                "workflow.get",
                "workflow.create",
                "workflow.update",
                "workflow.delete",
                "workflow.activate",
                "workflow.deactivate",
                "workflow.execute",
            ]),
        ),
        (
            2,
            tier(&[
                "workflow.duplicate",
                "workflow.move",
                "workflow.rename",
                "workflow.restore_version",
                "workflow.get_versions",
            ]),
        ),
        (
            3,
            tier(&[
                "credential.list",
                "credential.create",
                "environment.get_variables",
                "environment.set_variable",
            ]),
        ),
    ])
}

pub enum RegistryCommand {
    ToolsForTier {
        tier: u8,
        reply: oneshot::Sender<Vec<String>>,
    },
    ToolsUpToTier {
        tier: u8,
        reply: oneshot::Sender<Vec<String>>,
    },
    ToolTier {
        tool: String,
        reply: oneshot::Sender<Option<u8>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

pub struct TierRegistry {
    tiers: Option<TierTable>,
    durable: Arc<dyn DurableStore>,
}

impl TierRegistry {
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            tiers: None,
            durable,
        }
    }

    /// Load from durable storage on first access, seeding defaults when the
    /// store has no table yet
    async fn table(&mut self) -> &TierTable {
        if self.tiers.is_none() {
            let table = self.load().await;
            self.tiers = Some(table);
        }
        self.tiers.get_or_insert_with(default_tiers)
    }

    async fn load(&self) -> TierTable {
        match self.durable.read(STORAGE_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<(u8, Vec<String>)>>(value) {
                Ok(pairs) => {
                    debug!("tier table loaded from durable storage");
                    return pairs.into_iter().collect();
                }
                Err(e) => {
                    warn!(error = %e, "stored tier table unparseable, reseeding defaults");
                }
            },
            Ok(None) => {}
            Err(e) => {
                // Do not seed over a table we merely failed to read
                warn!(error = %e, "tier table read failed, using defaults without seeding");
                return default_tiers();
            }
        }

        let table = default_tiers();
        self.persist(&table).await;
        debug!("default tier table seeded");
        table
    }

    async fn persist(&self, table: &TierTable) {
        let pairs: Vec<(&u8, &Vec<String>)> = table.iter().collect();
        if let Err(e) = self.durable.write(STORAGE_KEY, &json!(pairs)).await {
            warn!(error = %e, "tier table persist failed");
        }
    }

    async fn tools_for_tier(&mut self, tier: u8) -> Vec<String> {
        self.table()
            .await
            .get(&tier)
            .cloned()
            .unwrap_or_default()
    }

    async fn tools_up_to_tier(&mut self, tier: u8) -> Vec<String> {
        self.table()
            .await
            .range(..=tier)
            .flat_map(|(_, tools)| tools.iter().cloned())
            .collect()
    }

    async fn tool_tier(&mut self, tool: &str) -> Option<u8> {
        self.table()
            .await
            .iter()
            .find(|(_, tools)| tools.iter().any(|t| t == tool))
            .map(|(tier, _)| *tier)
    }

    /// Drop the stored table so the next access reseeds defaults. Only the
    /// registry's own key is touched.
    async fn reset(&mut self) {
        self.tiers = None;
        if let Err(e) = self.durable.delete(STORAGE_KEY).await {
            warn!(error = %e, "tier table delete failed during reset");
        }
    }
}

#[async_trait]
impl Coordinator for TierRegistry {
    type Command = RegistryCommand;

    async fn handle(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::ToolsForTier { tier, reply } => {
                let _ = reply.send(self.tools_for_tier(tier).await);
            }
            RegistryCommand::ToolsUpToTier { tier, reply } => {
                let _ = reply.send(self.tools_up_to_tier(tier).await);
            }
            RegistryCommand::ToolTier { tool, reply } => {
                let _ = reply.send(self.tool_tier(&tool).await);
            }
            RegistryCommand::Reset { reply } => {
                self.reset().await;
                let _ = reply.send(());
            }
        }
    }
}

/// Typed client for the tier registry
#[derive(Clone)]
pub struct RegistryHandle {
    inner: CoordinatorHandle<RegistryCommand>,
}

impl RegistryHandle {
    pub fn spawn(durable: Arc<dyn DurableStore>) -> (Self, JoinHandle<()>) {
        let (inner, task) = spawn(TierRegistry::new(durable));
        (Self { inner }, task)
    }

    pub async fn tools_for_tier(&self, tier: u8) -> Result<Vec<String>> {
        self.inner
            .call(|reply| RegistryCommand::ToolsForTier { tier, reply })
            .await
    }

    /// Every tool in tiers 1 through `tier`, in ascending tier order
    pub async fn tools_up_to_tier(&self, tier: u8) -> Result<Vec<String>> {
        self.inner
            .call(|reply| RegistryCommand::ToolsUpToTier { tier, reply })
            .await
    }

    pub async fn tool_tier(&self, tool: &str) -> Result<Option<u8>> {
        let tool = tool.to_string();
        self.inner
            .call(|reply| RegistryCommand::ToolTier { tool, reply })
            .await
    }

    pub async fn reset(&self) -> Result<()> {
        self.inner.call(|reply| RegistryCommand::Reset { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::MemoryDurableStore;

    fn registry() -> (TierRegistry, MemoryDurableStore) {
        let durable = MemoryDurableStore::new();
        (TierRegistry::new(Arc::new(durable.clone())), durable)
    }

    #[tokio::test]
    async fn test_first_access_seeds_defaults() {
        let (mut registry, durable) = registry();
        let tools = registry.tools_for_tier(1).await;
        assert!(tools.contains(&"workflow.execute".to_string()));
        assert!(durable.contains("tiers").await);
    }

    #[tokio::test]
    async fn test_stored_table_wins_over_defaults() {
        let (mut registry, durable) = registry();
        durable
            .seed("tiers", json!([[1, ["a", "b"]], [2, ["c"]]]))
            .await;

        assert_eq!(registry.tools_for_tier(1).await, vec!["a", "b"]);
        assert_eq!(registry.tools_up_to_tier(2).await, vec!["a", "b", "c"]);
        assert_eq!(registry.tool_tier("c").await, Some(2));
        assert_eq!(registry.tool_tier("z").await, None);
    }

    #[tokio::test]
    async fn test_tools_up_to_tier_is_ascending() {
        let (mut registry, _) = registry();
        let tools = registry.tools_up_to_tier(3).await;

        let t1 = tools.iter().position(|t| t == "workflow.list");
        let t2 = tools.iter().position(|t| t == "workflow.duplicate");
        let t3 = tools.iter().position(|t| t == "credential.list");
        assert!(t1 < t2 && t2 < t3);
    }

    #[tokio::test]
    async fn test_unknown_tier_is_empty() {
        let (mut registry, _) = registry();
        assert!(registry.tools_for_tier(9).await.is_empty());
    }

    #[tokio::test]
    async fn test_default_tier_lookup() {
        let (mut registry, _) = registry();
        assert_eq!(registry.tool_tier("workflow.get").await, Some(1));
        assert_eq!(registry.tool_tier("workflow.move").await, Some(2));
        assert_eq!(registry.tool_tier("credential.create").await, Some(3));
    }

    #[tokio::test]
    async fn test_reset_reseeds_on_next_access() {
        let (mut registry, durable) = registry();
        durable.seed("tiers", json!([[1, ["only"]]])).await;
        assert_eq!(registry.tools_for_tier(1).await, vec!["only"]);

        registry.reset().await;
        let tools = registry.tools_for_tier(1).await;
        assert!(tools.contains(&"workflow.list".to_string()));
    }
}
