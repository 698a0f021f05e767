//! Mailbox transport
//!
//! Every agent instance listens on two logical mailboxes: a role mailbox
//! keyed by title (competing consumers; any instance of the role may pick a
//! request up) and an instance mailbox keyed by `title_identifier` (direct
//! responses return to the exact instance that asked). Payloads cross the
//! boundary as JSON values; decoding and input-schema validation happen here,
//! and a failure is logged and dropped before it can reach a state machine.
//!
//! Dispatch acknowledges by completion: a mailbox task hands one message to
//! its handler and only takes the next message after the handler returns.

use crate::directory::AgentDirectory;
use crate::identity::AgentIdentity;
use crate::protocol::{DirectMessage, HelpRequest, HelpResponse};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// An agent as the transport sees it: an identity plus the two delivery
/// entry points.
#[async_trait]
pub trait MailboxAgent: Send + Sync {
    fn identity(&self) -> &AgentIdentity;

    /// A validated Help Request arrived on the role mailbox
    async fn on_instruction(&self, request: HelpRequest) -> Result<(), Error>;

    /// A direct message (help response) arrived on the instance mailbox
    async fn on_direct_message(&self, message: DirectMessage) -> Result<(), Error>;
}

/// The transport abstraction agents send through
#[async_trait]
pub trait Environment: Send + Sync {
    /// Bind an agent to its role and instance mailboxes
    async fn register(&self, agent: Arc<dyn MailboxAgent>) -> Result<(), Error>;

    /// Deliver a Help Request to the role mailbox named by its `job_title`
    async fn send_help_request(&self, request: HelpRequest) -> Result<(), Error>;

    /// Deliver a Help Response to the instance mailbox of `to_title`/`to_id`
    async fn send_help_response(
        &self,
        response: HelpResponse,
        to_title: &str,
        to_id: &str,
    ) -> Result<(), Error>;

    /// Stop all mailbox dispatchers
    async fn shutdown(&self) -> Result<(), Error>;
}

struct RoleBox {
    tx: mpsc::UnboundedSender<Value>,
    handlers: Arc<RwLock<Vec<Arc<dyn MailboxAgent>>>>,
}

/// In-process implementation of the transport: tokio channels as mailboxes
pub struct InProcessEnvironment {
    directory: Arc<AgentDirectory>,
    role_boxes: RwLock<HashMap<String, RoleBox>>,
    instance_boxes: RwLock<HashMap<String, mpsc::UnboundedSender<Value>>>,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl InProcessEnvironment {
    pub fn new(directory: Arc<AgentDirectory>) -> Arc<Self> {
        Arc::new(InProcessEnvironment {
            directory,
            role_boxes: RwLock::new(HashMap::new()),
            instance_boxes: RwLock::new(HashMap::new()),
            tasks: RwLock::new(Vec::new()),
        })
    }

    pub fn directory(&self) -> &Arc<AgentDirectory> {
        &self.directory
    }

    async fn register_agent(&self, agent: Arc<dyn MailboxAgent>) -> Result<(), Error> {
        let identity = agent.identity().clone();
        debug!(
            "Registering agent {} on mailboxes {} and {}",
            identity.identifier,
            identity.title,
            identity.instance_mailbox()
        );

        // Instance mailbox: direct messages for exactly this agent
        {
            let mut instance_boxes = self.instance_boxes.write().await;
            if instance_boxes.contains_key(&identity.instance_mailbox()) {
                return Err(anyhow!(
                    "instance mailbox {} already registered",
                    identity.instance_mailbox()
                ));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            instance_boxes.insert(identity.instance_mailbox(), tx);
            let task = tokio::spawn(Self::run_instance_box(agent.clone(), rx));
            self.tasks.write().await.push(task);
        }

        // Role mailbox: create on first registration, join afterwards
        {
            let mut role_boxes = self.role_boxes.write().await;
            match role_boxes.get(&identity.title) {
                Some(role_box) => {
                    role_box.handlers.write().await.push(agent.clone());
                }
                None => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let handlers = Arc::new(RwLock::new(vec![agent.clone()]));
                    let task = tokio::spawn(Self::run_role_box(
                        identity.title.clone(),
                        handlers.clone(),
                        rx,
                    ));
                    self.tasks.write().await.push(task);
                    role_boxes.insert(identity.title.clone(), RoleBox { tx, handlers });
                }
            }
        }

        self.directory
            .register(&identity.title, &identity.identifier)
            .await;
        Ok(())
    }

    /// Deliver a raw payload to a role or instance mailbox, bypassing
    /// serialization. Lets deployments and tests exercise the decode boundary.
    pub async fn post_raw(&self, mailbox: &str, payload: Value) -> Result<(), Error> {
        if let Some(role_box) = self.role_boxes.read().await.get(mailbox) {
            role_box
                .tx
                .send(payload)
                .map_err(|_| anyhow!("role mailbox {} is closed", mailbox))?;
            return Ok(());
        }
        if let Some(tx) = self.instance_boxes.read().await.get(mailbox) {
            tx.send(payload)
                .map_err(|_| anyhow!("instance mailbox {} is closed", mailbox))?;
            return Ok(());
        }
        Err(anyhow!("no mailbox named {}", mailbox))
    }

    async fn run_role_box(
        title: String,
        handlers: Arc<RwLock<Vec<Arc<dyn MailboxAgent>>>>,
        mut rx: mpsc::UnboundedReceiver<Value>,
    ) {
        let next = AtomicUsize::new(0);
        while let Some(payload) = rx.recv().await {
            // Decode boundary: a payload that is not a Help Request never
            // reaches a state machine.
            let request: HelpRequest = match serde_json::from_value(payload) {
                Ok(r) => r,
                Err(e) => {
                    error!("Decode error on role mailbox {}: {}", title, e);
                    continue;
                }
            };

            let handler = {
                let handlers = handlers.read().await;
                if handlers.is_empty() {
                    error!("Role mailbox {} has no consumers; dropping request", title);
                    continue;
                }
                let index = next.fetch_add(1, Ordering::Relaxed) % handlers.len();
                handlers[index].clone()
            };

            // Schema validation boundary
            if let Err(e) = handler.identity().validate_input(&request.message) {
                error!(
                    "Decode error on role mailbox {}: input failed schema validation: {}",
                    title, e
                );
                continue;
            }

            if let Err(e) = handler.on_instruction(request).await {
                error!(
                    "Agent {} failed to process instruction: {}",
                    handler.identity().identifier,
                    e
                );
            }
        }
        debug!("Role mailbox {} closed", title);
    }

    async fn run_instance_box(
        agent: Arc<dyn MailboxAgent>,
        mut rx: mpsc::UnboundedReceiver<Value>,
    ) {
        let mailbox = agent.identity().instance_mailbox();
        while let Some(payload) = rx.recv().await {
            let message: DirectMessage = match serde_json::from_value(payload) {
                Ok(m) => m,
                Err(e) => {
                    error!("Decode error on instance mailbox {}: {}", mailbox, e);
                    continue;
                }
            };
            if let Err(e) = agent.on_direct_message(message).await {
                error!("Agent {} failed to process direct message: {}", mailbox, e);
            }
        }
        debug!("Instance mailbox {} closed", mailbox);
    }
}

#[async_trait]
impl Environment for InProcessEnvironment {
    /// Bind an agent to its mailboxes and record it in the directory.
    /// Registering a second instance under the same title joins the existing
    /// role mailbox as a competing consumer.
    async fn register(&self, agent: Arc<dyn MailboxAgent>) -> Result<(), Error> {
        self.register_agent(agent).await
    }

    async fn send_help_request(&self, request: HelpRequest) -> Result<(), Error> {
        debug!(
            "Routing help request {} from {}/{} to role {}",
            request.request_id, request.helpee_title, request.helpee_id, request.job_title
        );
        let role_boxes = self.role_boxes.read().await;
        let role_box = role_boxes
            .get(&request.job_title)
            .ok_or_else(|| anyhow!("no agent registered for role {}", request.job_title))?;
        let payload = serde_json::to_value(&request)?;
        role_box
            .tx
            .send(payload)
            .map_err(|_| anyhow!("role mailbox {} is closed", request.job_title))?;
        Ok(())
    }

    async fn send_help_response(
        &self,
        response: HelpResponse,
        to_title: &str,
        to_id: &str,
    ) -> Result<(), Error> {
        let mailbox = format!(
            "{}{}{}",
            to_title,
            foreman_common::constants::MAILBOX_SEPARATOR,
            to_id
        );
        debug!(
            "Routing help response {} from {} to {}",
            response.request_id, response.helper_identifier, mailbox
        );
        let instance_boxes = self.instance_boxes.read().await;
        let tx = instance_boxes
            .get(&mailbox)
            .ok_or_else(|| anyhow!("no instance mailbox named {}", mailbox))?;
        let payload = serde_json::to_value(DirectMessage::HelpResponse(response))?;
        tx.send(payload)
            .map_err(|_| anyhow!("instance mailbox {} is closed", mailbox))?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Error> {
        warn!("Shutting down in-process environment");
        self.role_boxes.write().await.clear();
        self.instance_boxes.write().await.clear();
        for task in self.tasks.write().await.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Records everything delivered to it
    struct ProbeAgent {
        identity: AgentIdentity,
        instructions: Mutex<Vec<HelpRequest>>,
        responses: Mutex<Vec<HelpResponse>>,
    }

    impl ProbeAgent {
        fn new(title: &str, identifier: &str) -> Arc<Self> {
            Arc::new(ProbeAgent {
                identity: AgentIdentity::new(
                    title,
                    identifier,
                    "probe",
                    json!({
                        "type": "object",
                        "properties": {"q": {"type": "string"}},
                        "required": ["q"]
                    }),
                    json!({"type": "object"}),
                ),
                instructions: Mutex::new(Vec::new()),
                responses: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MailboxAgent for ProbeAgent {
        fn identity(&self) -> &AgentIdentity {
            &self.identity
        }

        async fn on_instruction(&self, request: HelpRequest) -> Result<(), Error> {
            self.instructions.lock().await.push(request);
            Ok(())
        }

        async fn on_direct_message(&self, message: DirectMessage) -> Result<(), Error> {
            let DirectMessage::HelpResponse(response) = message;
            self.responses.lock().await.push(response);
            Ok(())
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_role_and_instance_routing() {
        let directory = Arc::new(AgentDirectory::new());
        let env = InProcessEnvironment::new(directory.clone());
        let agent = ProbeAgent::new("prober", "p1");
        env.register(agent.clone()).await.unwrap();

        let caller = AgentIdentity::permissive("root", "r1", "driver");
        let request = HelpRequest::new(&caller, "c0", "prober", json!({"q": "hi"}));
        env.send_help_request(request.clone()).await.unwrap();
        settle().await;
        assert_eq!(agent.instructions.lock().await.len(), 1);
        assert!(directory.has_title("prober").await);

        let helper = AgentIdentity::permissive("other", "o1", "helper");
        let response = HelpResponse::success(&request, &helper, json!({"ok": true}));
        env.send_help_response(response, "prober", "p1").await.unwrap();
        settle().await;
        assert_eq!(agent.responses.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unroutable_request_is_an_error() {
        let env = InProcessEnvironment::new(Arc::new(AgentDirectory::new()));
        let caller = AgentIdentity::permissive("root", "r1", "driver");
        let request = HelpRequest::new(&caller, "c0", "nobody", json!({}));
        assert!(env.send_help_request(request).await.is_err());
    }

    #[tokio::test]
    async fn test_decode_failures_are_dropped_before_the_agent() {
        let env = InProcessEnvironment::new(Arc::new(AgentDirectory::new()));
        let agent = ProbeAgent::new("prober", "p1");
        env.register(agent.clone()).await.unwrap();

        // Not a Help Request at all
        env.post_raw("prober", json!({"garbage": true})).await.unwrap();
        // Well-formed envelope, input fails the agent's schema
        let caller = AgentIdentity::permissive("root", "r1", "driver");
        let bad_input = HelpRequest::new(&caller, "c0", "prober", json!({"q": 42}));
        env.send_help_request(bad_input).await.unwrap();
        // Garbage on the instance mailbox
        env.post_raw("prober_p1", json!("nope")).await.unwrap();
        settle().await;

        assert!(agent.instructions.lock().await.is_empty());
        assert!(agent.responses.lock().await.is_empty());

        // The mailboxes survived all three
        let good = HelpRequest::new(&caller, "c0", "prober", json!({"q": "still alive"}));
        env.send_help_request(good).await.unwrap();
        settle().await;
        assert_eq!(agent.instructions.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_competing_consumers_share_a_role_mailbox() {
        let env = InProcessEnvironment::new(Arc::new(AgentDirectory::new()));
        let first = ProbeAgent::new("prober", "p1");
        let second = ProbeAgent::new("prober", "p2");
        env.register(first.clone()).await.unwrap();
        env.register(second.clone()).await.unwrap();

        let caller = AgentIdentity::permissive("root", "r1", "driver");
        for _ in 0..4 {
            let request = HelpRequest::new(&caller, "c0", "prober", json!({"q": "work"}));
            env.send_help_request(request).await.unwrap();
        }
        settle().await;

        let first_count = first.instructions.lock().await.len();
        let second_count = second.instructions.lock().await.len();
        assert_eq!(first_count + second_count, 4);
        assert!(first_count > 0 && second_count > 0);
    }
}
