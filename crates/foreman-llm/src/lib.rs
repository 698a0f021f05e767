//! Foreman LLM
//!
//! The LLM collaborator consumed by the autonomous agent state machine:
//! given a conversation history and the callable tool definitions, produce
//! thoughts, observations, and at most one helper call. Prompt formatting and
//! vendor protocol live entirely behind the `Thinker` trait.

pub mod genai_thinker;
pub mod script;
pub mod thinker;

pub use genai_thinker::GenaiThinker;
pub use script::{RepeatThinker, ScriptedThinker};
pub use thinker::{HelperCall, ThinkTurn, Thinker, ThinkerError, ToolDef};
