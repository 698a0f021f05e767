//! Episodic event model
//!
//! Every state transition of an agent conversation is recorded as one
//! append-only event. The event kind is a closed sum type so that every
//! consumer (formatting, replay, routing) matches exhaustively and a new
//! kind is a compile error everywhere it matters.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who caused an event: the outside world (instructions, responses) or the
/// agent's own machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    External,
    Worker,
}

/// The closed set of things that can happen in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStart,
    Plan,
    AvailableTools,
    Instruction,
    Answer,
    Help,
    Response,
    Thought,
    Observation,
    Hallucination,
    LlmError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskStart => "task_start",
            EventKind::Plan => "plan",
            EventKind::AvailableTools => "available_tools",
            EventKind::Instruction => "instruction",
            EventKind::Answer => "answer",
            EventKind::Help => "help",
            EventKind::Response => "response",
            EventKind::Thought => "thought",
            EventKind::Observation => "observation",
            EventKind::Hallucination => "hallucination",
            EventKind::LlmError => "llm_error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Correlation payload carried by a deterministic agent's `Help` event so the
/// eventual response can restore the caller's position in its multi-step
/// logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallData {
    /// Request id echoed back by the helper's response
    pub request_id: String,
    /// Opaque caller context restored when the response arrives
    pub context: Value,
}

/// One record in a conversation's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicEvent {
    pub actor: Actor,
    pub kind: EventKind,
    /// Role title of the agent that owns the log
    pub agent_title: String,
    /// Instance identifier of the agent that owns the log
    pub agent_id: String,
    pub conversation_id: String,
    /// Write-order position within the conversation, assigned by the store
    pub seq: u64,
    /// Milliseconds since the UNIX epoch
    pub timestamp: i64,
    /// Kind-specific payload
    pub content: Value,
    /// Present only on deterministic-agent `Help` events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_data: Option<CallData>,
}

impl EpisodicEvent {
    /// Create an event with `seq` unassigned (the store assigns it on append).
    pub fn new(
        actor: Actor,
        kind: EventKind,
        agent_title: impl Into<String>,
        agent_id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: Value,
    ) -> Self {
        EpisodicEvent {
            actor,
            kind,
            agent_title: agent_title.into(),
            agent_id: agent_id.into(),
            conversation_id: conversation_id.into(),
            seq: 0,
            timestamp: Utc::now().timestamp_millis(),
            content,
            call_data: None,
        }
    }

    /// Attach correlation data (deterministic-agent help calls).
    pub fn with_call_data(mut self, call_data: CallData) -> Self {
        self.call_data = Some(call_data);
        self
    }

    /// The `text` field of the content, for the kinds that carry one
    /// (plan, instruction, thought, observation).
    pub fn content_text(&self) -> Option<&str> {
        self.content.get("text").and_then(|t| t.as_str())
    }
}

/// Render an ordered conversation log as a human-readable transcript, one
/// line per event. Used by the CLI and debug logging.
pub fn render_transcript(events: &[EpisodicEvent]) -> String {
    let mut out = String::new();
    for event in events {
        let summary = match event.kind {
            EventKind::Thought
            | EventKind::Observation
            | EventKind::Plan
            | EventKind::Instruction => event
                .content_text()
                .map(|t| t.to_string())
                .unwrap_or_else(|| event.content.to_string()),
            _ => event.content.to_string(),
        };
        out.push_str(&format!(
            "[{:>4}] {:<16} {}\n",
            event.seq,
            event.kind.as_str(),
            foreman_common::utils::truncate_string(&summary, 120)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_wire_tags() {
        let kind: Value = serde_json::to_value(EventKind::TaskStart).unwrap();
        assert_eq!(kind, json!("task_start"));
        let kind: Value = serde_json::to_value(EventKind::AvailableTools).unwrap();
        assert_eq!(kind, json!("available_tools"));
    }

    #[test]
    fn test_content_text() {
        let event = EpisodicEvent::new(
            Actor::Worker,
            EventKind::Thought,
            "worker",
            "w1",
            "c1",
            json!({"text": "hmm"}),
        );
        assert_eq!(event.content_text(), Some("hmm"));
        assert!(event.call_data.is_none());
    }

    #[test]
    fn test_transcript_lists_events_in_order() {
        let mut first = EpisodicEvent::new(
            Actor::External,
            EventKind::TaskStart,
            "worker",
            "w1",
            "c1",
            json!({"input": {"q": 1}}),
        );
        first.seq = 1;
        let mut second = EpisodicEvent::new(
            Actor::Worker,
            EventKind::Thought,
            "worker",
            "w1",
            "c1",
            json!({"text": "working on it"}),
        );
        second.seq = 2;
        let transcript = render_transcript(&[first, second]);
        let task_pos = transcript.find("task_start").unwrap();
        let thought_pos = transcript.find("thought").unwrap();
        assert!(task_pos < thought_pos);
        assert!(transcript.contains("working on it"));
    }
}
