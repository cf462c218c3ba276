// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template contract the Job Runner dispatches against. A template knows how
//! to enumerate the items a job should act on, build a prompt for a changed
//! item, and declare the tool policy its session runs under. Dispatch is by
//! `template_id` lookup in a [`TemplateRegistry`] rather than a shared
//! mutable policy object, so two runs of the same template never race over
//! policy state.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::{Policy, TemplateItem, ToolCapabilityResolver};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("{0}")]
    Message(String),
}

/// A unit of work a template knows how to enumerate and act on.
#[async_trait]
pub trait Template: Send + Sync {
    fn template_id(&self) -> &str;

    /// Enumerate the current items this job should consider (e.g. open
    /// issues, pending PRs). Each item's `hash` feeds the runner's change
    /// tracker.
    async fn resolve_items(
        &self,
        job_config: &serde_json::Value,
    ) -> Result<Vec<TemplateItem>, TemplateError>;

    /// Build the agent prompt for one changed item.
    fn build_prompt(&self, item: &TemplateItem) -> String;

    /// Fields of an item's data that feed the content hash (documentation
    /// only; the hash itself is computed by the caller supplying
    /// `TemplateItem::hash`).
    fn canonical_hash_fields(&self) -> &[&str];

    /// Fields deliberately excluded from the content hash (e.g. volatile
    /// timestamps) so unrelated churn doesn't look like a change.
    fn excluded_hash_fields(&self) -> &[&str] {
        &[]
    }

    /// The tool policy installed in the firewall for every session this
    /// template opens.
    fn policy(&self) -> Policy;

    /// Declares each tool's capability (`read`/`write`/`admin`) independent
    /// of the allow/deny policy — the firewall resolves capability first
    /// and denies `admin` unconditionally, before policy is even consulted.
    fn capabilities(&self) -> Arc<dyn ToolCapabilityResolver>;
}

/// Looks up a [`Template`] by id. Templates register themselves at startup;
/// there is no dynamic loading.
#[derive(Default, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<dyn Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: Arc<dyn Template>) {
        self.templates.insert(template.template_id().to_string(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<Arc<dyn Template>> {
        self.templates.get(template_id).cloned()
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
