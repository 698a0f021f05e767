//! Deterministic code agent
//!
//! The non-LLM variant of the state machine: same envelopes, same event
//! vocabulary, but "thinking" is direct code execution. A help call appends a
//! `help` event whose `call_data` stores the request id and an opaque caller
//! context, then returns immediately; when the response arrives, the log is
//! searched for that `help` event and the behavior resumes with the original
//! context restored. A response whose `help` event cannot be found is logged
//! and dropped.

use crate::environment::{Environment, MailboxAgent};
use crate::identity::AgentIdentity;
use crate::protocol::{DirectMessage, HelpRequest, HelpResponse, HelpStatus, TaskOrigin};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use foreman_common::utils::generate_id;
use foreman_memory::{Actor, CallData, EpisodicEvent, EpisodicStore, EventKind};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

/// The concrete logic a code agent runs. `exec` handles a fresh task;
/// `on_help_response` continues a task that asked for help, with the context
/// stored at call time handed back.
#[async_trait]
pub trait CodeBehavior: Send + Sync {
    async fn exec(&self, task: &CodeTask<'_>) -> Result<(), Error>;

    async fn on_help_response(
        &self,
        task: &CodeTask<'_>,
        response: &HelpResponse,
        context: &Value,
    ) -> Result<(), Error>;
}

/// A running code agent instance
pub struct CodeAgent {
    identity: AgentIdentity,
    behavior: Arc<dyn CodeBehavior>,
    store: Arc<dyn EpisodicStore>,
    environment: Arc<dyn Environment>,
}

/// One task as seen by a behavior: its conversation, origin, and input, plus
/// the operations that advance it.
pub struct CodeTask<'a> {
    agent: &'a CodeAgent,
    pub conversation_id: String,
    pub origin: TaskOrigin,
    pub input: Value,
}

impl CodeTask<'_> {
    /// Ask another agent for help and return immediately. The `context` comes
    /// back verbatim with the response so multi-step logic can pick up where
    /// it left off. Returns the request id put on the wire.
    pub async fn ask_for_help(
        &self,
        job_title: &str,
        message: Value,
        context: Value,
    ) -> Result<String, Error> {
        let request = HelpRequest::new(
            &self.agent.identity,
            self.conversation_id.as_str(),
            job_title,
            message,
        );
        let event = EpisodicEvent::new(
            Actor::Worker,
            EventKind::Help,
            self.agent.identity.title.as_str(),
            self.agent.identity.identifier.as_str(),
            self.conversation_id.as_str(),
            json!({
                "tool_name": job_title,
                "arguments": request.message.clone(),
            }),
        )
        .with_call_data(CallData {
            request_id: request.request_id.clone(),
            context,
        });
        self.agent.store.append(event).await?;

        info!(
            conversation = %self.conversation_id,
            "Code agent asking {} for help (request {})", job_title, request.request_id
        );
        let request_id = request.request_id.clone();
        self.agent.environment.send_help_request(request).await?;
        Ok(request_id)
    }

    /// Record the final answer and respond to the task's origin
    pub async fn answer(&self, response: Value) -> Result<(), Error> {
        self.agent
            .append(
                &self.conversation_id,
                Actor::Worker,
                EventKind::Answer,
                json!({"response": response}),
            )
            .await?;
        let envelope = HelpResponse::to_origin(
            &self.origin,
            &self.agent.identity,
            HelpStatus::Success,
            response,
        );
        self.agent
            .environment
            .send_help_response(envelope, &self.origin.helpee_title, &self.origin.helpee_id)
            .await
    }

    /// Respond to the task's origin with a failure
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), Error> {
        let reason = reason.into();
        error!(
            conversation = %self.conversation_id,
            "Code agent task failed: {}", reason
        );
        let envelope = HelpResponse::to_origin(
            &self.origin,
            &self.agent.identity,
            HelpStatus::Failure,
            json!({"error": reason}),
        );
        self.agent
            .environment
            .send_help_response(envelope, &self.origin.helpee_title, &self.origin.helpee_id)
            .await
    }
}

impl CodeAgent {
    pub fn new(
        identity: AgentIdentity,
        behavior: Arc<dyn CodeBehavior>,
        store: Arc<dyn EpisodicStore>,
        environment: Arc<dyn Environment>,
    ) -> Self {
        CodeAgent {
            identity,
            behavior,
            store,
            environment,
        }
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
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
        Ok(self.store.append(event).await?)
    }

    fn task_from_start(&self, start: &EpisodicEvent) -> Result<CodeTask<'_>, Error> {
        let origin: TaskOrigin = serde_json::from_value(
            start
                .content
                .get("origin")
                .cloned()
                .ok_or_else(|| anyhow!("task_start event has no origin"))?,
        )?;
        let input = start.content.get("input").cloned().unwrap_or(Value::Null);
        Ok(CodeTask {
            agent: self,
            conversation_id: start.conversation_id.clone(),
            origin,
            input,
        })
    }

    /// Start a new task: record it, then run the behavior. A behavior error
    /// becomes a failure response to the origin.
    pub async fn process_instruction(&self, request: HelpRequest) -> Result<(), Error> {
        let conversation_id = generate_id();
        info!(
            agent = %self.identity.identifier,
            conversation = %conversation_id,
            "Code agent starting task from {}/{}",
            request.helpee_title,
            request.helpee_id
        );
        let origin = TaskOrigin::from_request(&request);
        let start = self
            .append(
                &conversation_id,
                Actor::External,
                EventKind::TaskStart,
                json!({"origin": origin, "input": request.message}),
            )
            .await?;

        let task = self.task_from_start(&start)?;
        if let Err(e) = self.behavior.exec(&task).await {
            task.fail(e.to_string()).await?;
        }
        Ok(())
    }

    /// Resume on a help response: locate the `help` event whose `call_data`
    /// carries the response's request id, restore its context, and hand both
    /// to the behavior. No match means the response is unroutable.
    pub async fn process_direct_message(&self, message: DirectMessage) -> Result<(), Error> {
        let DirectMessage::HelpResponse(response) = message;
        let history = self
            .store
            .conversation(&self.identity.identifier, &response.task_id)
            .await?;

        let help_event = history.iter().find(|e| {
            e.kind == EventKind::Help
                && e.call_data
                    .as_ref()
                    .is_some_and(|cd| cd.request_id == response.request_id)
        });
        let Some(help_event) = help_event else {
            error!(
                agent = %self.identity.identifier,
                "Unroutable help response {}: no matching help event in conversation {}",
                response.request_id,
                response.task_id
            );
            return Ok(());
        };
        let context = help_event
            .call_data
            .as_ref()
            .map(|cd| cd.context.clone())
            .unwrap_or(Value::Null);

        self.append(
            &response.task_id,
            Actor::External,
            EventKind::Response,
            json!({
                "helper_title": response.helper_title.clone(),
                "status": response.status,
                "response": response.response.clone(),
            }),
        )
        .await?;

        let start = history
            .first()
            .ok_or_else(|| anyhow!("conversation has no task_start"))?;
        let task = self.task_from_start(start)?;
        if let Err(e) = self
            .behavior
            .on_help_response(&task, &response, &context)
            .await
        {
            task.fail(e.to_string()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MailboxAgent for CodeAgent {
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

/// A one-shot code behavior wrapping a plain function: run it on the task
/// input and answer with the result. Builtins never ask for help.
pub struct Builtin {
    func: Box<dyn Fn(&Value) -> Result<Value, Error> + Send + Sync>,
}

impl Builtin {
    pub fn new(func: impl Fn(&Value) -> Result<Value, Error> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Builtin {
            func: Box::new(func),
        })
    }
}

#[async_trait]
impl CodeBehavior for Builtin {
    async fn exec(&self, task: &CodeTask<'_>) -> Result<(), Error> {
        match (self.func)(&task.input) {
            Ok(result) => task.answer(result).await,
            Err(e) => task.fail(e.to_string()).await,
        }
    }

    async fn on_help_response(
        &self,
        _task: &CodeTask<'_>,
        response: &HelpResponse,
        _context: &Value,
    ) -> Result<(), Error> {
        Err(anyhow!(
            "builtin received an unexpected help response {}",
            response.request_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_memory::InMemoryEpisodicStore;
    use tokio::sync::Mutex;

    struct CaptureEnvironment {
        requests: Mutex<Vec<HelpRequest>>,
        responses: Mutex<Vec<(HelpResponse, String, String)>>,
    }

    impl CaptureEnvironment {
        fn new() -> Arc<Self> {
            Arc::new(CaptureEnvironment {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Environment for CaptureEnvironment {
        async fn register(&self, _agent: Arc<dyn MailboxAgent>) -> Result<(), Error> {
            Ok(())
        }

        async fn send_help_request(&self, request: HelpRequest) -> Result<(), Error> {
            self.requests.lock().await.push(request);
            Ok(())
        }

        async fn send_help_response(
            &self,
            response: HelpResponse,
            to_title: &str,
            to_id: &str,
        ) -> Result<(), Error> {
            self.responses
                .lock()
                .await
                .push((response, to_title.to_string(), to_id.to_string()));
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn instruction(message: Value) -> HelpRequest {
        HelpRequest {
            helpee_title: "root".to_string(),
            helpee_id: "r1".to_string(),
            task_id: "c0".to_string(),
            request_id: "req1".to_string(),
            job_title: "adder".to_string(),
            message,
        }
    }

    #[tokio::test]
    async fn test_builtin_adder_answers_its_origin() {
        // Wrap add({a,b}) => {x: a+b} as a one-shot agent
        let store = Arc::new(InMemoryEpisodicStore::new());
        let environment = CaptureEnvironment::new();
        let behavior = Builtin::new(|input: &Value| {
            let a = input["a"].as_f64().ok_or_else(|| anyhow!("missing a"))?;
            let b = input["b"].as_f64().ok_or_else(|| anyhow!("missing b"))?;
            Ok(json!({"x": a + b}))
        });
        let agent = CodeAgent::new(
            AgentIdentity::permissive("adder", "a1", "adds two numbers"),
            behavior,
            store.clone(),
            environment.clone(),
        );

        agent
            .process_instruction(instruction(json!({"a": 10, "b": 30})))
            .await
            .unwrap();

        let responses = environment.responses.lock().await;
        assert_eq!(responses.len(), 1);
        let (response, to_title, to_id) = &responses[0];
        assert_eq!(to_title, "root");
        assert_eq!(to_id, "r1");
        assert_eq!(response.task_id, "c0");
        assert_eq!(response.request_id, "req1");
        assert_eq!(response.status, HelpStatus::Success);
        assert_eq!(response.response, json!({"x": 40.0}));

        let ids = store.conversation_ids("a1").await;
        let events = store.conversation("a1", &ids[0]).await.unwrap();
        assert_eq!(events[0].kind, EventKind::TaskStart);
        assert_eq!(events.last().unwrap().kind, EventKind::Answer);
    }

    #[tokio::test]
    async fn test_builtin_error_becomes_failure_response() {
        let store = Arc::new(InMemoryEpisodicStore::new());
        let environment = CaptureEnvironment::new();
        let behavior = Builtin::new(|_input: &Value| Err(anyhow!("division by zero")));
        let agent = CodeAgent::new(
            AgentIdentity::permissive("divider", "d1", "divides"),
            behavior,
            store,
            environment.clone(),
        );

        agent
            .process_instruction(instruction(json!({"a": 1, "b": 0})))
            .await
            .unwrap();

        let responses = environment.responses.lock().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0.status, HelpStatus::Failure);
        assert_eq!(responses[0].0.response["error"], "division by zero");
    }

    /// Two-step behavior: delegate the sum, then answer double the result.
    struct Doubler;

    #[async_trait]
    impl CodeBehavior for Doubler {
        async fn exec(&self, task: &CodeTask<'_>) -> Result<(), Error> {
            task.ask_for_help(
                "adder",
                task.input.clone(),
                json!({"phase": "awaiting_sum"}),
            )
            .await?;
            Ok(())
        }

        async fn on_help_response(
            &self,
            task: &CodeTask<'_>,
            response: &HelpResponse,
            context: &Value,
        ) -> Result<(), Error> {
            if context["phase"] != "awaiting_sum" {
                return Err(anyhow!("unexpected context: {}", context));
            }
            let x = response.response["x"]
                .as_f64()
                .ok_or_else(|| anyhow!("helper returned no sum"))?;
            task.answer(json!({"doubled": x * 2.0})).await
        }
    }

    #[tokio::test]
    async fn test_multi_step_behavior_resumes_with_context() {
        let store = Arc::new(InMemoryEpisodicStore::new());
        let environment = CaptureEnvironment::new();
        let agent = CodeAgent::new(
            AgentIdentity::permissive("doubler", "d1", "doubles a sum"),
            Arc::new(Doubler),
            store.clone(),
            environment.clone(),
        );

        let mut request = instruction(json!({"a": 3, "b": 4}));
        request.job_title = "doubler".to_string();
        agent.process_instruction(request).await.unwrap();

        // Suspended on the help call; nothing answered yet
        let sent = environment.requests.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].job_title, "adder");
        assert!(environment.responses.lock().await.is_empty());

        let help_response = HelpResponse {
            task_id: sent[0].task_id.clone(),
            request_id: sent[0].request_id.clone(),
            helper_title: "adder".to_string(),
            helper_identifier: "a1".to_string(),
            status: HelpStatus::Success,
            response: json!({"x": 7.0}),
        };
        agent
            .process_direct_message(DirectMessage::HelpResponse(help_response))
            .await
            .unwrap();

        let responses = environment.responses.lock().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0.response, json!({"doubled": 14.0}));

        let events = store.conversation("d1", &sent[0].task_id).await.unwrap();
        let help = events.iter().find(|e| e.kind == EventKind::Help).unwrap();
        assert_eq!(
            help.call_data.as_ref().unwrap().context,
            json!({"phase": "awaiting_sum"})
        );
        assert!(events.iter().any(|e| e.kind == EventKind::Response));
    }

    #[tokio::test]
    async fn test_response_without_matching_help_event_is_dropped() {
        // A bogus request id is logged and dropped: nothing appended, no panic
        let store = Arc::new(InMemoryEpisodicStore::new());
        let environment = CaptureEnvironment::new();
        let agent = CodeAgent::new(
            AgentIdentity::permissive("doubler", "d1", "doubles a sum"),
            Arc::new(Doubler),
            store.clone(),
            environment.clone(),
        );

        let mut request = instruction(json!({"a": 3, "b": 4}));
        request.job_title = "doubler".to_string();
        agent.process_instruction(request).await.unwrap();

        let sent = environment.requests.lock().await.clone();
        let conversation_id = sent[0].task_id.clone();
        let before = store.conversation("d1", &conversation_id).await.unwrap().len();

        let bogus = HelpResponse {
            task_id: conversation_id.clone(),
            request_id: "bogus".to_string(),
            helper_title: "adder".to_string(),
            helper_identifier: "a1".to_string(),
            status: HelpStatus::Success,
            response: json!({"x": 7.0}),
        };
        agent
            .process_direct_message(DirectMessage::HelpResponse(bogus))
            .await
            .unwrap();

        let after = store.conversation("d1", &conversation_id).await.unwrap().len();
        assert_eq!(before, after);
        assert!(environment.responses.lock().await.is_empty());
    }
}
