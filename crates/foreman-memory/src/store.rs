//! Storage traits for the episodic log and template blobs

use crate::event::EpisodicEvent;
use async_trait::async_trait;
use foreman_common::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Append-only, per-conversation ordered event storage.
///
/// Logs are scoped by owning agent instance plus conversation id. Events are
/// read back in write order; they are never mutated or deleted. Different
/// conversations never contend; appends to the same conversation are expected
/// to come from one serialized `think` invocation at a time.
#[async_trait]
pub trait EpisodicStore: Send + Sync {
    /// Append an event, assigning its write-order `seq`. Returns the stored
    /// event with `seq` filled in.
    async fn append(&self, event: EpisodicEvent) -> Result<EpisodicEvent>;

    /// Read the full ordered log of one conversation. Empty if the
    /// conversation has never been seen.
    async fn conversation(&self, agent_id: &str, conversation_id: &str)
    -> Result<Vec<EpisodicEvent>>;
}

/// Source of the small plan / instruction template blobs an agent resolves
/// at task start, keyed by agent title.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn plan(&self, agent_title: &str) -> Result<Option<String>>;
    async fn instructions(&self, agent_title: &str) -> Result<Option<String>>;
}

/// In-memory template store used by deployments and tests
#[derive(Default)]
pub struct TemplateLibrary {
    plans: RwLock<HashMap<String, String>>,
    instructions: RwLock<HashMap<String, String>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_plan(&self, agent_title: impl Into<String>, template: impl Into<String>) {
        self.plans
            .write()
            .await
            .insert(agent_title.into(), template.into());
    }

    pub async fn set_instructions(
        &self,
        agent_title: impl Into<String>,
        template: impl Into<String>,
    ) {
        self.instructions
            .write()
            .await
            .insert(agent_title.into(), template.into());
    }
}

#[async_trait]
impl TemplateStore for TemplateLibrary {
    async fn plan(&self, agent_title: &str) -> Result<Option<String>> {
        Ok(self.plans.read().await.get(agent_title).cloned())
    }

    async fn instructions(&self, agent_title: &str) -> Result<Option<String>> {
        Ok(self.instructions.read().await.get(agent_title).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_library_roundtrip() {
        let library = TemplateLibrary::new();
        library.set_plan("worker", "Plan for {{question}}").await;

        assert_eq!(
            library.plan("worker").await.unwrap(),
            Some("Plan for {{question}}".to_string())
        );
        assert_eq!(library.plan("other").await.unwrap(), None);
        assert_eq!(library.instructions("worker").await.unwrap(), None);
    }
}
