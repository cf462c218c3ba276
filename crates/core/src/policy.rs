// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability policy shape consulted by the Tool Firewall.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse permission level attached to a tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Admin,
}

/// Post-admit predicates for a specific tool. A violation is itself a
/// `denied` audit entry and fails the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConstraints {
    #[serde(default)]
    pub draft_only: bool,
    #[serde(default)]
    pub labels_only: bool,
    #[serde(default)]
    pub max_comment_length: Option<usize>,
    #[serde(default)]
    pub denied_events: Vec<String>,
}

/// A template's declared tool policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    pub template_id: String,
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    #[serde(default)]
    pub constraints: HashMap<String, ToolConstraints>,
}

impl Policy {
    pub fn is_denied(&self, tool: &str) -> bool {
        self.deny.iter().any(|t| t == tool)
    }

    pub fn is_allowed(&self, tool: &str) -> bool {
        self.allow.iter().any(|t| t == tool)
    }

    pub fn constraints_for(&self, tool: &str) -> Option<&ToolConstraints> {
        self.constraints.get(tool)
    }
}

/// Static declaration of a tool's capability. Resolved by the firewall
/// before any policy check runs; admin tools are always denied regardless
/// of what a policy says.
pub trait ToolCapabilityResolver: Send + Sync {
    fn capability(&self, tool: &str) -> Option<Capability>;
}

/// A simple in-memory capability table, suitable for templates that declare
/// their tool capabilities statically.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable(HashMap<String, Capability>);

impl CapabilityTable {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, tool: impl Into<String>, capability: Capability) -> Self {
        self.0.insert(tool.into(), capability);
        self
    }
}

impl ToolCapabilityResolver for CapabilityTable {
    fn capability(&self, tool: &str) -> Option<Capability> {
        self.0.get(tool).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_allow_deny_checks() {
        let policy = Policy {
            template_id: "t".into(),
            allow: vec!["comment".into()],
            deny: vec!["delete_repo".into()],
            constraints: HashMap::new(),
        };
        assert!(policy.is_allowed("comment"));
        assert!(!policy.is_allowed("delete_repo"));
        assert!(policy.is_denied("delete_repo"));
        assert!(!policy.is_denied("comment"));
    }

    #[test]
    fn capability_table_resolves() {
        let table = CapabilityTable::new()
            .with("comment", Capability::Write)
            .with("read_issue", Capability::Read)
            .with("delete_repo", Capability::Admin);
        assert_eq!(table.capability("comment"), Some(Capability::Write));
        assert_eq!(table.capability("unknown"), None);
        assert_eq!(table.capability("delete_repo"), Some(Capability::Admin));
    }
}
