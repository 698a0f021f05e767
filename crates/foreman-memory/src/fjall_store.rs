//! Fjäll-based implementation of the episodic store
//!
//! Durable backend: events are serialized as JSON bytes under keys of the
//! form `agent_id/conversation_id/seq`, so a conversation survives process
//! restarts and resumption can replay it from disk alone.

use crate::event::EpisodicEvent;
use crate::store::EpisodicStore;
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use foreman_common::{ForemanError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Partition holding all episodic events
const PARTITION_EVENTS: &str = "events";

/// A Fjäll-based implementation of the EpisodicStore trait
pub struct FjallEpisodicStore {
    keyspace: Arc<Keyspace>,
    events: PartitionHandle,
    /// Serializes seq assignment across concurrent appends
    append_lock: Mutex<()>,
}

impl FjallEpisodicStore {
    /// Create a new FjallEpisodicStore with the given data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let keyspace = Config::new(data_dir)
            .open()
            .map_err(|e| ForemanError::Memory(e.to_string()))?;
        let events = keyspace
            .open_partition(PARTITION_EVENTS, PartitionCreateOptions::default())
            .map_err(|e| ForemanError::Memory(e.to_string()))?;
        Ok(Self {
            keyspace: Arc::new(keyspace),
            events,
            append_lock: Mutex::new(()),
        })
    }

    fn conversation_prefix(agent_id: &str, conversation_id: &str) -> String {
        format!("{}/{}/", agent_id, conversation_id)
    }

    /// Key layout: zero-padded seq keeps lexicographic order == write order
    fn event_key(agent_id: &str, conversation_id: &str, seq: u64) -> Vec<u8> {
        format!("{}/{}/{:010}", agent_id, conversation_id, seq).into_bytes()
    }

    fn serialize_event(event: &EpisodicEvent) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(event)?)
    }

    fn deserialize_event(bytes: &[u8]) -> Result<EpisodicEvent> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn scan_conversation(&self, agent_id: &str, conversation_id: &str) -> Result<Vec<EpisodicEvent>> {
        let prefix = Self::conversation_prefix(agent_id, conversation_id);
        let mut results = Vec::new();
        for kv in self.events.iter() {
            let (key, value) = kv.map_err(|e| ForemanError::Memory(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                continue;
            }
            let event = match Self::deserialize_event(&value) {
                Ok(e) => e,
                Err(_) => continue,
            };
            results.push(event);
        }
        results.sort_by_key(|e| e.seq);
        Ok(results)
    }
}

#[async_trait]
impl EpisodicStore for FjallEpisodicStore {
    async fn append(&self, mut event: EpisodicEvent) -> Result<EpisodicEvent> {
        let _guard = self.append_lock.lock().await;
        let existing = self.scan_conversation(&event.agent_id, &event.conversation_id)?;
        event.seq = existing.last().map(|e| e.seq).unwrap_or(0) + 1;

        let key = Self::event_key(&event.agent_id, &event.conversation_id, event.seq);
        let value = Self::serialize_event(&event)?;
        self.events
            .insert(key, value)
            .map_err(|e| ForemanError::Memory(e.to_string()))?;
        self.keyspace
            .persist(PersistMode::Buffer)
            .map_err(|e| ForemanError::Memory(e.to_string()))?;
        Ok(event)
    }

    async fn conversation(
        &self,
        agent_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<EpisodicEvent>> {
        self.scan_conversation(agent_id, conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Actor, EventKind};
    use serde_json::json;
    use tempfile::tempdir;

    fn event(kind: EventKind, content: serde_json::Value) -> EpisodicEvent {
        EpisodicEvent::new(Actor::Worker, kind, "worker", "w1", "c1", content)
    }

    #[tokio::test]
    async fn test_append_and_ordered_read() {
        let dir = tempdir().unwrap();
        let store = FjallEpisodicStore::new(dir.path()).unwrap();

        store
            .append(event(EventKind::TaskStart, json!({"input": {}})))
            .await
            .unwrap();
        store
            .append(event(EventKind::Thought, json!({"text": "first"})))
            .await
            .unwrap();
        store
            .append(event(EventKind::Thought, json!({"text": "second"})))
            .await
            .unwrap();

        let log = store.conversation("w1", "c1").await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].kind, EventKind::TaskStart);
        assert_eq!(log[1].content_text(), Some("first"));
        assert_eq!(log[2].content_text(), Some("second"));
        assert_eq!(log[2].seq, 3);
    }

    #[tokio::test]
    async fn test_log_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FjallEpisodicStore::new(dir.path()).unwrap();
            store
                .append(event(EventKind::TaskStart, json!({"input": {}})))
                .await
                .unwrap();
            store
                .append(event(EventKind::Help, json!({"tool_name": "mgr"})))
                .await
                .unwrap();
        }

        // A fresh handle over the same directory sees the full ordered log,
        // which is what lets a restarted process resume a suspended task.
        let reopened = FjallEpisodicStore::new(dir.path()).unwrap();
        let log = reopened.conversation("w1", "c1").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].kind, EventKind::Help);

        let next = reopened
            .append(event(EventKind::Response, json!({"status": "success"})))
            .await
            .unwrap();
        assert_eq!(next.seq, 3);
    }
}
