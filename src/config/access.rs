//! Role-based access control for gateway tools
//!
//! All state lives in an explicit [`AccessControl`] value carried by the
//! gateway; there are no globals. An unauthorized user is denied everything,
//! including tools with no explicit entry. Unknown tools default to the
//! `read` level rather than public.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Permission levels in ascending order of privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Public,
    Read,
    Write,
    Execute,
    Admin,
    #[serde(rename = "infra")]
    Infrastructure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    /// Users allowed any access at all
    pub authorized_users: HashSet<String>,
    /// Users allowed admin-level tools
    pub deployment_users: HashSet<String>,
    /// Users allowed infrastructure-level tools
    pub infrastructure_admins: HashSet<String>,
    /// Required level per tool; tools without an entry require `read`
    pub tool_permissions: HashMap<String, PermissionLevel>,
}

impl Default for AccessControl {
    fn default() -> Self {
        Self {
            authorized_users: HashSet::new(),
            deployment_users: HashSet::new(),
            infrastructure_admins: HashSet::new(),
            tool_permissions: default_tool_permissions(),
        }
    }
}

impl AccessControl {
    /// Whether `user` may invoke `tool`. Unauthorized users are always
    /// denied; read/write/execute tools need only authorization, admin
    /// tools need deployment membership, infrastructure tools need
    /// infrastructure membership.
    pub fn check_permission(&self, user: &str, tool: &str) -> bool {
        if !self.authorized_users.contains(user) {
            return false;
        }

        let required = self
            .tool_permissions
            .get(tool)
            .copied()
            .unwrap_or(PermissionLevel::Read);

        match required {
            PermissionLevel::Public
            | PermissionLevel::Read
            | PermissionLevel::Write
            | PermissionLevel::Execute => true,
            PermissionLevel::Admin => self.deployment_users.contains(user),
            PermissionLevel::Infrastructure => self.infrastructure_admins.contains(user),
        }
    }

    /// The highest level the user holds, or None if unauthorized
    pub fn user_level(&self, user: &str) -> Option<PermissionLevel> {
        if self.infrastructure_admins.contains(user) {
            Some(PermissionLevel::Infrastructure)
        } else if self.deployment_users.contains(user) {
            Some(PermissionLevel::Admin)
        } else if self.authorized_users.contains(user) {
            Some(PermissionLevel::Execute)
        } else {
            None
        }
    }

    pub fn has_level(&self, user: &str, level: PermissionLevel) -> bool {
        self.user_level(user).is_some_and(|held| held >= level)
    }
}

/// Built-in tool permission table
pub fn default_tool_permissions() -> HashMap<String, PermissionLevel> {
    use PermissionLevel::*;

    let entries = [
        ("workflow.list", Read),
        ("workflow.get", Read),
        ("workflow.create", Write),
        ("workflow.update", Write),
        ("workflow.delete", Admin),
        ("workflow.activate", Execute),
        ("workflow.deactivate", Execute),
        ("workflow.execute", Execute),
        ("workflow.duplicate", Write),
        ("workflow.move", Write),
        ("workflow.rename", Write),
        ("workflow.restore_version", Admin),
        ("workflow.get_versions", Read),
        ("workflow.share", Admin),
        ("execution.list", Read),
        ("execution.get", Read),
        ("execution.retry", Execute),
        ("execution.stop", Execute),
        ("execution.delete", Admin),
        ("node.search", Read),
        ("node.get_details", Read),
        ("node.list_by_category", Read),
        ("credential.list", Admin),
        ("credential.get", Admin),
        ("credential.create", Admin),
        ("credential.update", Admin),
        ("credential.delete", Admin),
        ("credential.test", Admin),
        ("environment.get_variables", Admin),
        ("environment.set_variable", Infrastructure),
        ("environment.delete_variable", Infrastructure),
    ];

    entries
        .into_iter()
        .map(|(tool, level)| (tool.to_string(), level))
        .collect()
}
