//! In-memory implementation of the episodic store
//!
//! The default backend for tests and single-process deployments. Conversations
//! are independent vectors behind one RwLock; appends to different
//! conversations never observe each other.

use crate::event::EpisodicEvent;
use crate::store::EpisodicStore;
use async_trait::async_trait;
use foreman_common::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Append-only in-memory event log keyed by agent instance + conversation id
#[derive(Default)]
pub struct InMemoryEpisodicStore {
    conversations: RwLock<HashMap<String, Vec<EpisodicEvent>>>,
}

impl InMemoryEpisodicStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(agent_id: &str, conversation_id: &str) -> String {
        format!("{}/{}", agent_id, conversation_id)
    }

    /// Conversation ids recorded for one agent instance, in no particular
    /// order. Inspection helper for tests and the CLI.
    pub async fn conversation_ids(&self, agent_id: &str) -> Vec<String> {
        let prefix = format!("{}/", agent_id);
        self.conversations
            .read()
            .await
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(|s| s.to_string()))
            .collect()
    }
}

#[async_trait]
impl EpisodicStore for InMemoryEpisodicStore {
    async fn append(&self, mut event: EpisodicEvent) -> Result<EpisodicEvent> {
        let key = Self::key(&event.agent_id, &event.conversation_id);
        let mut conversations = self.conversations.write().await;
        let log = conversations.entry(key).or_default();
        event.seq = log.len() as u64 + 1;
        log.push(event.clone());
        Ok(event)
    }

    async fn conversation(
        &self,
        agent_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<EpisodicEvent>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(&Self::key(agent_id, conversation_id))
            .cloned()
            .unwrap_or_default())
    }
}
