//! Outstanding-request table
//!
//! Promise-style callers park a continuation here under the request id they
//! put on the wire. At most one continuation may be registered per id; a
//! response with an unknown id is unroutable (logged and dropped, never
//! retried). Entries carry a TTL so an abandoned request eventually resolves
//! to a synthesized failure instead of leaking forever.

use crate::protocol::{HelpResponse, HelpStatus};
use anyhow::{Error, anyhow};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, warn};

struct PendingEntry {
    inserted_at: DateTime<Utc>,
    tx: oneshot::Sender<HelpResponse>,
}

/// In-memory map of request id → pending continuation
pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
    ttl: Duration,
}

impl PendingRequests {
    pub fn new(ttl_secs: i64) -> Self {
        PendingRequests {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Register a continuation for a request id. Fails if one is already
    /// outstanding for the same id.
    pub async fn register(&self, request_id: &str) -> Result<oneshot::Receiver<HelpResponse>, Error> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(request_id) {
            return Err(anyhow!(
                "request id {} already has an outstanding continuation",
                request_id
            ));
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(
            request_id.to_string(),
            PendingEntry {
                inserted_at: Utc::now(),
                tx,
            },
        );
        debug!("Registered outstanding request {}", request_id);
        Ok(rx)
    }

    /// Route a response to its continuation. Returns false (after logging)
    /// when no continuation matches (the unroutable-response case).
    pub async fn resolve(&self, response: HelpResponse) -> bool {
        let entry = self.entries.lock().await.remove(&response.request_id);
        match entry {
            Some(entry) => {
                debug!("Resolving outstanding request {}", response.request_id);
                if entry.tx.send(response).is_err() {
                    warn!("Continuation dropped before its response arrived");
                }
                true
            }
            None => {
                error!(
                    "Unroutable help response: no outstanding request {} (task {})",
                    response.request_id, response.task_id
                );
                false
            }
        }
    }

    /// Drop a continuation that will never get a response (e.g. the request
    /// could not be sent). Returns whether an entry existed.
    pub async fn cancel(&self, request_id: &str) -> bool {
        self.entries.lock().await.remove(request_id).is_some()
    }

    /// Sweep expired entries, resolving each with a synthesized failure so no
    /// caller hangs forever. Returns how many were evicted.
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now - e.inserted_at > self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for request_id in &expired {
            if let Some(entry) = entries.remove(request_id) {
                warn!(
                    "Outstanding request {} expired after {}s; synthesizing failure",
                    request_id,
                    self.ttl.num_seconds()
                );
                let _ = entry.tx.send(HelpResponse {
                    task_id: String::new(),
                    request_id: request_id.clone(),
                    helper_title: String::new(),
                    helper_identifier: String::new(),
                    status: HelpStatus::Failure,
                    response: json!({"error": "help request timed out"}),
                });
            }
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
