//! LLM-driven agent state machine
//!
//! A conversation moves `Idle → TaskStarted → Thinking → {AwaitingHelp |
//! Answered | Failed}`, and `AwaitingHelp → Thinking` when a help response
//! arrives. The machine is driven by two entry points, `process_instruction`
//! for new tasks and `process_direct_message` for resumptions, and keeps no
//! conversation state outside the episodic log: suspension fully unwinds the
//! stack, and resumption replays the log, so a process restart between the
//! two loses nothing as long as the log is durable.

use crate::environment::{Environment, MailboxAgent};
use crate::identity::AgentIdentity;
use crate::protocol::{DirectMessage, HelpRequest, HelpResponse, HelpStatus, TaskOrigin};
use crate::registry::{HelperBinding, HelperDescriptor, HelperRegistry};
use crate::worker::WorkerRole;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use foreman_common::AgentTuning;
use foreman_common::utils::{generate_id, render_template};
use foreman_llm::Thinker;
use foreman_memory::{Actor, EpisodicEvent, EpisodicStore, EventKind, TemplateStore};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// The external collaborators an agent runs against
#[derive(Clone)]
pub struct AgentServices {
    pub store: Arc<dyn EpisodicStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub thinker: Arc<dyn Thinker>,
    pub environment: Arc<dyn Environment>,
}

/// How one `think` invocation left the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkOutcome {
    /// The final answer was recorded and sent to the origin
    Answered,
    /// A help request is in flight; the conversation resumes on its response
    AwaitingHelp,
    /// The iteration budget ran out; a failure response was sent
    Failed,
}

/// One LLM-driven agent instance
pub struct AutonomousAgent {
    identity: AgentIdentity,
    role: WorkerRole,
    /// Statically configured remote helpers
    helpers: Vec<HelperDescriptor>,
    manager: Option<HelperDescriptor>,
    qa_manager: Option<HelperDescriptor>,
    services: AgentServices,
    tuning: AgentTuning,
    /// Serializes `think` invocations per conversation id
    conversation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AutonomousAgent {
    pub fn new(
        identity: AgentIdentity,
        role: WorkerRole,
        helpers: Vec<HelperDescriptor>,
        manager: Option<HelperDescriptor>,
        qa_manager: Option<HelperDescriptor>,
        services: AgentServices,
        tuning: AgentTuning,
    ) -> Self {
        AutonomousAgent {
            identity,
            role,
            helpers,
            manager,
            qa_manager,
            services,
            tuning,
            conversation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Role-specific helpers injected on top of the configured list
    fn extras(&self) -> Vec<HelperDescriptor> {
        let mut extras = Vec::new();
        if let Some(qa) = &self.qa_manager {
            extras.push(qa.clone());
        }
        if let Some(manager) = &self.manager {
            extras.push(manager.clone());
        }
        extras
    }

    /// The tool registry as the next think round would see it
    pub fn helper_registry(&self) -> HelperRegistry {
        HelperRegistry::build(&self.identity, &self.helpers, &self.extras())
    }

    async fn append(
        &self,
        conversation_id: &str,
        actor: Actor,
        kind: EventKind,
        content: Value,
    ) -> Result<EpisodicEvent, Error> {
        let event = EpisodicEvent::new(
            actor,
            kind,
            self.identity.title.as_str(),
            self.identity.identifier.as_str(),
            conversation_id,
            content,
        );
        Ok(self.services.store.append(event).await?)
    }

    async fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.conversation_locks.lock().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Recover who to answer from the conversation's `task_start` event
    fn task_origin(history: &[EpisodicEvent]) -> Result<TaskOrigin, Error> {
        let first = history
            .first()
            .ok_or_else(|| anyhow!("conversation has no events"))?;
        if first.kind != EventKind::TaskStart {
            return Err(anyhow!("conversation does not begin with task_start"));
        }
        let origin = first
            .content
            .get("origin")
            .cloned()
            .ok_or_else(|| anyhow!("task_start event has no origin"))?;
        Ok(serde_json::from_value(origin)?)
    }

    /// Entry point for a brand-new task. The input has already passed the
    /// transport's schema validation. Setup errors propagate to the transport;
    /// think-loop errors become a failure response to the origin.
    pub async fn process_instruction(&self, request: HelpRequest) -> Result<(), Error> {
        let conversation_id = generate_id();
        info!(
            role = self.role.as_str(),
            agent = %self.identity.identifier,
            conversation = %conversation_id,
            "Starting task from {}/{} (request {})",
            request.helpee_title,
            request.helpee_id,
            request.request_id
        );

        let origin = TaskOrigin::from_request(&request);
        self.append(
            &conversation_id,
            Actor::External,
            EventKind::TaskStart,
            json!({"origin": origin, "input": request.message.clone()}),
        )
        .await?;

        let plan = match self.services.templates.plan(&self.identity.title).await? {
            Some(template) => render_template(&template, &request.message),
            None => self.identity.job_description.clone(),
        };
        self.append(
            &conversation_id,
            Actor::Worker,
            EventKind::Plan,
            json!({"text": plan}),
        )
        .await?;

        let registry = self.helper_registry();
        if !registry.remote_is_empty() {
            let tools: Vec<Value> = registry
                .tool_defs()
                .iter()
                .map(|def| json!({"name": def.name, "description": def.description}))
                .collect();
            self.append(
                &conversation_id,
                Actor::Worker,
                EventKind::AvailableTools,
                json!({"tools": tools}),
            )
            .await?;
        }

        let instruction = match self
            .services
            .templates
            .instructions(&self.identity.title)
            .await?
        {
            Some(template) => render_template(&template, &request.message),
            None => format!("Handle this request: {}", request.message),
        };
        self.append(
            &conversation_id,
            Actor::External,
            EventKind::Instruction,
            json!({"text": instruction}),
        )
        .await?;

        self.run_think(&conversation_id).await
    }

    /// Entry point for help-response delivery, the sole resumption path.
    /// The appended `response` event plus replaying the log is what
    /// reconstructs the conversation's state.
    pub async fn process_direct_message(&self, message: DirectMessage) -> Result<(), Error> {
        let DirectMessage::HelpResponse(response) = message;
        let history = self
            .services
            .store
            .conversation(&self.identity.identifier, &response.task_id)
            .await?;
        if history.is_empty() {
            error!(
                agent = %self.identity.identifier,
                "Unroutable help response {}: no conversation {}",
                response.request_id,
                response.task_id
            );
            return Ok(());
        }

        let conversation_id = response.task_id.clone();
        self.append(
            &conversation_id,
            Actor::External,
            EventKind::Response,
            json!({
                "helper_title": response.helper_title,
                "status": response.status,
                "response": response.response,
            }),
        )
        .await?;

        self.run_think(&conversation_id).await
    }

    /// Run `think`, converting an escaped error into a failure answer so the
    /// caller's conversation always receives some resumption signal.
    async fn run_think(&self, conversation_id: &str) -> Result<(), Error> {
        match self.think(conversation_id).await {
            Ok(outcome) => {
                debug!(
                    conversation = %conversation_id,
                    "Think invocation finished: {:?}", outcome
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    conversation = %conversation_id,
                    "Think invocation failed: {}", e
                );
                self.fail_conversation(conversation_id, &e.to_string()).await
            }
        }
    }

    /// The bounded think loop. Re-entrant: called fresh on a new task and
    /// again on every resumption, each time replaying the full log. The round
    /// counter is local to one invocation; it bounds consecutive
    /// non-productive rounds, not conversation lifetime.
    pub async fn think(&self, conversation_id: &str) -> Result<ThinkOutcome, Error> {
        let lock = self.conversation_lock(conversation_id).await;
        let _guard = lock.lock().await;

        let mut history = self
            .services
            .store
            .conversation(&self.identity.identifier, conversation_id)
            .await?;
        let registry = self.helper_registry();
        let tool_defs = registry.tool_defs();

        let mut rounds = 0usize;
        loop {
            if rounds >= self.tuning.max_consecutive_thoughts {
                self.append(
                    conversation_id,
                    Actor::Worker,
                    EventKind::Hallucination,
                    json!({
                        "reason": "too_many_thoughts",
                        "budget": self.tuning.max_consecutive_thoughts,
                    }),
                )
                .await?;
                self.fail_conversation(
                    conversation_id,
                    "exceeded the consecutive thought budget without calling a tool",
                )
                .await?;
                return Ok(ThinkOutcome::Failed);
            }

            let turn = match self.services.thinker.think(&history, &tool_defs).await {
                Ok(turn) => turn,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        conversation = %conversation_id,
                        "Recoverable LLM error, counting a no-op round: {}", e
                    );
                    let event = self
                        .append(
                            conversation_id,
                            Actor::Worker,
                            EventKind::LlmError,
                            json!({"error": e.to_string()}),
                        )
                        .await?;
                    history.push(event);
                    rounds += 1;
                    continue;
                }
            };

            // Observations first, so the thoughts that reference them read
            // back after them.
            for observation in &turn.observations {
                let event = self
                    .append(
                        conversation_id,
                        Actor::Worker,
                        EventKind::Observation,
                        json!({"text": observation}),
                    )
                    .await?;
                history.push(event);
            }
            for thought in &turn.thoughts {
                let event = self
                    .append(
                        conversation_id,
                        Actor::Worker,
                        EventKind::Thought,
                        json!({"text": thought}),
                    )
                    .await?;
                history.push(event);
            }

            let Some(call) = turn.helper_call else {
                rounds += 1;
                continue;
            };

            let Some(entry) = registry.lookup(&call.title) else {
                warn!(
                    conversation = %conversation_id,
                    "Hallucinated tool call: {}", call.title
                );
                let event = self
                    .append(
                        conversation_id,
                        Actor::Worker,
                        EventKind::Hallucination,
                        json!({
                            "reason": "unknown_tool",
                            "tool": call.title,
                            "arguments": call.content,
                            "known_tools": registry.titles(),
                        }),
                    )
                    .await?;
                history.push(event);
                rounds += 1;
                continue;
            };

            let help_event = self
                .append(
                    conversation_id,
                    Actor::Worker,
                    EventKind::Help,
                    json!({
                        "tool_name": call.title,
                        "arguments": call.content.clone(),
                    }),
                )
                .await?;
            history.push(help_event);

            match &entry.binding {
                HelperBinding::FinalAnswer => {
                    self.deliver_answer(conversation_id, &history, call.content)
                        .await?;
                    return Ok(ThinkOutcome::Answered);
                }
                HelperBinding::Remote { title } => {
                    let request =
                        HelpRequest::new(&self.identity, conversation_id, title, call.content);
                    info!(
                        conversation = %conversation_id,
                        "Asking {} for help (request {})", title, request.request_id
                    );
                    self.services.environment.send_help_request(request).await?;
                    return Ok(ThinkOutcome::AwaitingHelp);
                }
            }
        }
    }

    async fn deliver_answer(
        &self,
        conversation_id: &str,
        history: &[EpisodicEvent],
        answer: Value,
    ) -> Result<(), Error> {
        self.append(
            conversation_id,
            Actor::Worker,
            EventKind::Answer,
            json!({"response": answer.clone()}),
        )
        .await?;
        let origin = Self::task_origin(history)?;
        info!(
            conversation = %conversation_id,
            "Answering {}/{} (request {})",
            origin.helpee_title,
            origin.helpee_id,
            origin.request_id
        );
        let response =
            HelpResponse::to_origin(&origin, &self.identity, HelpStatus::Success, answer);
        self.services
            .environment
            .send_help_response(response, &origin.helpee_title, &origin.helpee_id)
            .await
    }

    /// Terminal failure: the origin still gets a response rather than a hang
    async fn fail_conversation(&self, conversation_id: &str, reason: &str) -> Result<(), Error> {
        let history = self
            .services
            .store
            .conversation(&self.identity.identifier, conversation_id)
            .await?;
        let origin = Self::task_origin(&history)?;
        error!(
            conversation = %conversation_id,
            "Conversation failed, answering {}/{} with failure: {}",
            origin.helpee_title,
            origin.helpee_id,
            reason
        );
        let response = HelpResponse::to_origin(
            &origin,
            &self.identity,
            HelpStatus::Failure,
            json!({"error": reason}),
        );
        self.services
            .environment
            .send_help_response(response, &origin.helpee_title, &origin.helpee_id)
            .await
    }
}

#[async_trait]
impl MailboxAgent for AutonomousAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn on_instruction(&self, request: HelpRequest) -> Result<(), Error> {
        self.process_instruction(request).await
    }

    async fn on_direct_message(&self, message: DirectMessage) -> Result<(), Error> {
        self.process_direct_message(message).await
    }
}
