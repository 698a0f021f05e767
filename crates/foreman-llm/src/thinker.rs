//! The `Thinker` trait and its data types
//!
//! One thinker invocation is one LLM round: the full event log in, one turn
//! of thoughts/observations and at most one helper call out. Errors are
//! split into fatal provider failures (re-thrown by the state machine) and
//! recoverable ones (absorbed into the log as `llm_error` events).

use async_trait::async_trait;
use foreman_memory::EpisodicEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A callable capability exposed to the LLM: a remote helper agent or the
/// local final-answer sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's argument object
    pub schema: Value,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        ToolDef {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    /// Convert to a genai Tool
    pub fn to_genai_tool(&self) -> genai::chat::Tool {
        genai::chat::Tool::new(self.name.clone())
            .with_description(self.description.clone())
            .with_schema(self.schema.clone())
    }
}

/// A request by the LLM to invoke one tool by title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperCall {
    pub title: String,
    /// Arguments for the call; for `final_answer` this is the answer payload
    pub content: Value,
}

/// One round of LLM output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkTurn {
    pub thoughts: Vec<String>,
    pub observations: Vec<String>,
    pub helper_call: Option<HelperCall>,
}

impl ThinkTurn {
    /// A turn that only thinks out loud
    pub fn thought(text: impl Into<String>) -> Self {
        ThinkTurn {
            thoughts: vec![text.into()],
            ..Default::default()
        }
    }

    /// A turn that calls a helper
    pub fn call(title: impl Into<String>, content: Value) -> Self {
        ThinkTurn {
            helper_call: Some(HelperCall {
                title: title.into(),
                content,
            }),
            ..Default::default()
        }
    }
}

/// Errors from one thinker round
#[derive(Debug)]
pub enum ThinkerError {
    /// Transport/provider-level failure (API error, auth, rate limit).
    /// Fatal: re-thrown out of the think loop.
    Provider(String),
    /// The model produced output the thinker could not interpret.
    /// Recoverable: recorded as an `llm_error` event, counts as one round.
    Malformed(String),
    /// Any other recoverable failure
    Other(String),
}

impl ThinkerError {
    /// Fatal errors escape the think loop and fail the conversation
    pub fn is_fatal(&self) -> bool {
        matches!(self, ThinkerError::Provider(_))
    }
}

impl fmt::Display for ThinkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThinkerError::Provider(msg) => write!(f, "LLM provider error: {}", msg),
            ThinkerError::Malformed(msg) => write!(f, "Malformed LLM output: {}", msg),
            ThinkerError::Other(msg) => write!(f, "LLM error: {}", msg),
        }
    }
}

impl std::error::Error for ThinkerError {}

/// The LLM collaborator boundary
#[async_trait]
pub trait Thinker: Send + Sync {
    /// Run one LLM round over the full conversation history and the tools
    /// currently callable. Returns at most one helper call.
    async fn think(
        &self,
        history: &[EpisodicEvent],
        tools: &[ToolDef],
    ) -> Result<ThinkTurn, ThinkerError>;
}
