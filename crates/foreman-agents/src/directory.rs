//! Agent directory
//!
//! Title → instance mapping used to resolve remote helper calls. Explicitly
//! constructed and passed in wherever it is needed, so multiple deployments
//! can coexist in one process and tests can isolate state.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Directory of registered agent instances, keyed by role title
#[derive(Default)]
pub struct AgentDirectory {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an instance under its role title
    pub async fn register(&self, title: &str, identifier: &str) {
        debug!("Directory: registering {} under title {}", identifier, title);
        let mut entries = self.entries.write().await;
        let instances = entries.entry(title.to_string()).or_default();
        if !instances.iter().any(|i| i == identifier) {
            instances.push(identifier.to_string());
        }
    }

    /// Remove an instance registration
    pub async fn unregister(&self, title: &str, identifier: &str) {
        let mut entries = self.entries.write().await;
        if let Some(instances) = entries.get_mut(title) {
            instances.retain(|i| i != identifier);
            if instances.is_empty() {
                entries.remove(title);
            }
        }
    }

    /// All instances registered under a title
    pub async fn resolve(&self, title: &str) -> Vec<String> {
        self.entries
            .read()
            .await
            .get(title)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn has_title(&self, title: &str) -> bool {
        self.entries.read().await.contains_key(title)
    }

    /// All registered role titles
    pub async fn titles(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}
