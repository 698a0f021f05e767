//! genai-backed `Thinker`
//!
//! Replays the episodic log as a chat transcript, attaches the callable tool
//! definitions, and maps the model's reply to one `ThinkTurn`. Provider
//! errors from the client are fatal; uninterpretable replies are recoverable.

use crate::thinker::{HelperCall, ThinkTurn, Thinker, ThinkerError, ToolDef};
use async_trait::async_trait;
use foreman_memory::{EpisodicEvent, EventKind};
use genai::Client as GenaiClient;
use genai::chat::{ChatMessage as GenaiChatMessage, ChatRequest, MessageContent};
use tracing::{debug, info};

/// A `Thinker` that drives a real model through the genai client
pub struct GenaiThinker {
    /// Provider/model to use
    provider: String,
    /// Underlying client for the LLM
    client: GenaiClient,
}

impl GenaiThinker {
    /// Create a new genai thinker for the given provider/model
    pub fn new(provider: &str) -> Self {
        let client = GenaiClient::builder()
            .with_chat_options(genai::chat::ChatOptions {
                capture_content: Some(true),
                capture_reasoning_content: Some(true),
                capture_tool_calls: Some(true),
                capture_usage: Some(true),
                ..Default::default()
            })
            .build();

        GenaiThinker {
            provider: provider.to_string(),
            client,
        }
    }

    /// Render one event as a chat message. Events that carry no prompt
    /// content (answers, llm errors) render to `None`.
    fn event_to_message(event: &EpisodicEvent) -> Option<GenaiChatMessage> {
        let text_or_raw = || {
            event
                .content_text()
                .map(|t| t.to_string())
                .unwrap_or_else(|| event.content.to_string())
        };
        match event.kind {
            EventKind::TaskStart => {
                let input = event.content.get("input").cloned().unwrap_or_default();
                Some(GenaiChatMessage::system(format!(
                    "You are {} ({}). A new task has started with input: {}",
                    event.agent_title, event.agent_id, input
                )))
            }
            EventKind::Plan => Some(GenaiChatMessage::system(format!(
                "Your plan for this task:\n{}",
                text_or_raw()
            ))),
            EventKind::AvailableTools => Some(GenaiChatMessage::system(format!(
                "You may call these helpers (at most one per turn): {}",
                event.content
            ))),
            EventKind::Instruction => Some(GenaiChatMessage::user(text_or_raw())),
            EventKind::Thought => Some(GenaiChatMessage::assistant(text_or_raw())),
            EventKind::Observation => Some(GenaiChatMessage::user(format!(
                "Observation: {}",
                text_or_raw()
            ))),
            EventKind::Help => Some(GenaiChatMessage::assistant(format!(
                "Called helper {} with arguments {}",
                event
                    .content
                    .get("tool_name")
                    .and_then(|t| t.as_str())
                    .unwrap_or("?"),
                event.content.get("arguments").cloned().unwrap_or_default()
            ))),
            EventKind::Response => Some(GenaiChatMessage::user(format!(
                "Helper {} responded ({}): {}",
                event
                    .content
                    .get("helper_title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("?"),
                event
                    .content
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("?"),
                event.content.get("response").cloned().unwrap_or_default()
            ))),
            EventKind::Hallucination => Some(GenaiChatMessage::user(format!(
                "Your previous tool call was invalid: {}. Use only the listed helpers.",
                event.content
            ))),
            EventKind::Answer | EventKind::LlmError => None,
        }
    }
}

#[async_trait]
impl Thinker for GenaiThinker {
    async fn think(
        &self,
        history: &[EpisodicEvent],
        tools: &[ToolDef],
    ) -> Result<ThinkTurn, ThinkerError> {
        debug!(
            "Thinking over {} events with {} tools",
            history.len(),
            tools.len()
        );

        let messages: Vec<GenaiChatMessage> =
            history.iter().filter_map(Self::event_to_message).collect();

        let mut chat_req = ChatRequest::new(messages);
        if !tools.is_empty() {
            chat_req = chat_req.with_tools(tools.iter().map(|t| t.to_genai_tool()).collect());
        }

        debug!("Executing chat request to provider: {}", self.provider);
        let response = self
            .client
            .exec_chat(&self.provider, chat_req, None)
            .await
            .map_err(|e| ThinkerError::Provider(e.to_string()))?;

        let content = response
            .content
            .first()
            .cloned()
            .ok_or_else(|| ThinkerError::Malformed("no content in chat response".to_string()))?;

        match content {
            MessageContent::ToolCalls(tool_calls) => {
                let call = tool_calls
                    .into_iter()
                    .next()
                    .ok_or_else(|| ThinkerError::Malformed("empty tool call list".to_string()))?;
                info!("Model called tool '{}'", call.fn_name);
                Ok(ThinkTurn {
                    thoughts: Vec::new(),
                    observations: Vec::new(),
                    helper_call: Some(HelperCall {
                        title: call.fn_name,
                        content: call.fn_arguments,
                    }),
                })
            }
            MessageContent::Text(text) => {
                info!("Model produced a thought round");
                Ok(ThinkTurn::thought(text))
            }
            MessageContent::Parts(parts) => {
                let combined_text = parts
                    .into_iter()
                    .filter_map(|part| match part {
                        genai::chat::ContentPart::Text(text) => Some(text),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                if combined_text.is_empty() {
                    Err(ThinkerError::Malformed(
                        "response contained only non-text parts".to_string(),
                    ))
                } else {
                    Ok(ThinkTurn::thought(combined_text))
                }
            }
            MessageContent::ToolResponses(_) => Err(ThinkerError::Malformed(
                "model unexpectedly returned tool responses".to_string(),
            )),
        }
    }
}
