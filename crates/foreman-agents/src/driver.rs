//! Root driver
//!
//! The promise-style entry into a deployment: `ask` puts a Help Request on
//! the wire and returns a future that resolves when the matching response
//! lands on the driver's instance mailbox. Correlation runs through the
//! outstanding-request table; a reaper task converts abandoned requests into
//! failure responses so callers never hang.

use crate::environment::{Environment, MailboxAgent};
use crate::identity::AgentIdentity;
use crate::pending::PendingRequests;
use crate::protocol::{DirectMessage, HelpRequest, HelpResponse};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use foreman_common::constants::ROOT_TITLE;
use foreman_common::utils::generate_id;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Promise-style caller addressed as `root`/`<identifier>`
pub struct RootDriver {
    identity: AgentIdentity,
    pending: Arc<PendingRequests>,
    environment: Arc<dyn Environment>,
}

impl RootDriver {
    pub fn new(
        identifier: impl Into<String>,
        environment: Arc<dyn Environment>,
        pending_ttl_secs: i64,
    ) -> Arc<Self> {
        Arc::new(RootDriver {
            identity: AgentIdentity::permissive(
                ROOT_TITLE,
                identifier,
                "Root driver: dispatches tasks and awaits their answers",
            ),
            pending: Arc::new(PendingRequests::new(pending_ttl_secs)),
            environment,
        })
    }

    pub fn pending(&self) -> &Arc<PendingRequests> {
        &self.pending
    }

    /// Send a task to a role mailbox and await its Help Response. Each call
    /// is its own conversation from the driver's point of view.
    pub async fn ask(&self, job_title: &str, input: Value) -> Result<HelpResponse, Error> {
        let task_id = generate_id();
        let request = HelpRequest::new(&self.identity, task_id, job_title, input);
        let request_id = request.request_id.clone();

        let rx = self.pending.register(&request_id).await?;
        if let Err(e) = self.environment.send_help_request(request).await {
            self.pending.cancel(&request_id).await;
            return Err(e);
        }
        debug!("Driver {} awaiting request {}", self.identity.identifier, request_id);
        rx.await
            .map_err(|_| anyhow!("continuation for request {} was dropped", request_id))
    }

    /// Periodically evict expired outstanding requests, synthesizing failure
    /// responses for them. Runs until aborted.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let driver = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let evicted = driver.pending.evict_expired().await;
                if evicted > 0 {
                    warn!("Reaper evicted {} outstanding request(s)", evicted);
                }
            }
        })
    }
}

#[async_trait]
impl MailboxAgent for RootDriver {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn on_instruction(&self, request: HelpRequest) -> Result<(), Error> {
        warn!(
            "Root driver {} received an instruction (request {}); drivers take no tasks",
            self.identity.identifier, request.request_id
        );
        Ok(())
    }

    async fn on_direct_message(&self, message: DirectMessage) -> Result<(), Error> {
        let DirectMessage::HelpResponse(response) = message;
        // Unroutable responses are logged and dropped inside the table
        self.pending.resolve(response).await;
        Ok(())
    }
}
