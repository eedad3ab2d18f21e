use async_trait::async_trait;
use dashmap::DashMap;

use remedy_core::{ActionId, RemediationAction, RemediationRule, RuleId};
use remedy_store::{ActionPage, ActionQuery, RemediationStore, StoreError};

/// In-memory store using `DashMap`. Suitable for development and testing.
///
/// Nothing survives a restart; built-in rules are re-seeded on startup.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: DashMap<RuleId, RemediationRule>,
    actions: DashMap<ActionId, RemediationAction>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored actions.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

#[async_trait]
impl RemediationStore for MemoryStore {
    async fn load_enabled_rules(&self) -> Result<Vec<RemediationRule>, StoreError> {
        Ok(self
            .rules
            .iter()
            .filter(|entry| entry.value().enabled)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn save_rule(&self, rule: &RemediationRule) -> Result<(), StoreError> {
        self.rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, id: &RuleId) -> Result<bool, StoreError> {
        Ok(self.rules.remove(id).is_some())
    }

    async fn get_rule(&self, id: &RuleId) -> Result<Option<RemediationRule>, StoreError> {
        Ok(self.rules.get(id).map(|r| r.value().clone()))
    }

    async fn list_rules(&self) -> Result<Vec<RemediationRule>, StoreError> {
        let mut rules: Vec<RemediationRule> =
            self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(rules)
    }

    async fn save_action(&self, action: &RemediationAction) -> Result<(), StoreError> {
        self.actions.insert(action.id.clone(), action.clone());
        Ok(())
    }

    async fn get_action(&self, id: &ActionId) -> Result<Option<RemediationAction>, StoreError> {
        Ok(self.actions.get(id).map(|a| a.value().clone()))
    }

    async fn query_actions(&self, query: &ActionQuery) -> Result<ActionPage, StoreError> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let mut matching: Vec<RemediationAction> = self
            .actions
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        // Newest first.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let actions = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(ActionPage {
            actions,
            total,
            limit,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_store::testing::run_store_conformance_tests;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStore::new();
        run_store_conformance_tests(&store).await.unwrap();
    }

    #[tokio::test]
    async fn empty_store_returns_empty_page() {
        let store = MemoryStore::new();
        let page = store.query_actions(&ActionQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.actions.is_empty());
        assert_eq!(page.limit, 50);
        assert_eq!(store.action_count(), 0);
    }
}
