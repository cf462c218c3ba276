// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap as StdHashMap;

struct StubTemplate;

#[async_trait]
impl Template for StubTemplate {
    fn template_id(&self) -> &str {
        "stub"
    }

    async fn resolve_items(
        &self,
        _job_config: &serde_json::Value,
    ) -> Result<Vec<TemplateItem>, TemplateError> {
        Ok(vec![TemplateItem {
            key: "issue-1".into(),
            hash: "abc".into(),
            data: serde_json::json!({}),
        }])
    }

    fn build_prompt(&self, item: &TemplateItem) -> String {
        format!("handle {}", item.key)
    }

    fn canonical_hash_fields(&self) -> &[&str] {
        &["title", "body"]
    }

    fn policy(&self) -> Policy {
        Policy {
            template_id: "stub".into(),
            allow: vec!["comment".into()],
            deny: vec![],
            constraints: StdHashMap::new(),
        }
    }

    fn capabilities(&self) -> Arc<dyn warden_core::ToolCapabilityResolver> {
        Arc::new(
            warden_core::CapabilityTable::new().with("comment", warden_core::Capability::Write),
        )
    }
}

#[tokio::test]
async fn registry_resolves_registered_templates() {
    let mut registry = TemplateRegistry::new();
    registry.register(Arc::new(StubTemplate));

    let template = registry.get("stub").expect("registered template");
    let items = template.resolve_items(&serde_json::json!({})).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(template.build_prompt(&items[0]), "handle issue-1");
    assert!(registry.get("missing").is_none());
}
