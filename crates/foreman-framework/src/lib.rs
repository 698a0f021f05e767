//! Foreman Framework - Unified framework re-exporting all Foreman components
//!
//! This meta-crate provides a unified API surface by re-exporting
//! all functionality from the individual Foreman crates.

// Re-export all functionality from Foreman crates
pub use foreman_agents as agents;
pub use foreman_common as common;
pub use foreman_llm as llm;
pub use foreman_memory as memory;

// Re-export top-level types for convenience
pub use foreman_agents::{
    AgentDirectory, AgentIdentity, AgentServices, AutonomousAgent, Builtin, CodeAgent,
    CodeBehavior, Environment, HelpRequest, HelpResponse, HelpStatus, InProcessEnvironment,
    MailboxAgent, RootDriver, WorkerBuilder, WorkerRole,
};
pub use foreman_common::{ForemanError, Result};
pub use foreman_llm::{GenaiThinker, ThinkTurn, Thinker, ToolDef};
pub use foreman_memory::{EpisodicEvent, EpisodicStore, EventKind, InMemoryEpisodicStore};

/// Convenience prelude module for common imports
pub mod prelude {
    // Common types and errors
    pub use foreman_common::{AgentTuning, BaseConfig, ForemanError, ProviderConfig, Result};

    // Episodic log
    pub use foreman_memory::{
        Actor, CallData, EpisodicEvent, EpisodicStore, EventKind, FjallEpisodicStore,
        InMemoryEpisodicStore, TemplateLibrary, TemplateStore, render_transcript,
    };

    // LLM collaborator
    pub use foreman_llm::{
        GenaiThinker, HelperCall, RepeatThinker, ScriptedThinker, ThinkTurn, Thinker,
        ThinkerError, ToolDef,
    };

    // Agent system
    pub use foreman_agents::{
        AgentDirectory, AgentIdentity, AgentServices, AutonomousAgent, Builtin, CodeAgent,
        CodeBehavior, CodeTask, DirectMessage, Environment, HelpRequest, HelpResponse,
        HelpStatus, HelperDescriptor, HelperRegistry, InProcessEnvironment, MailboxAgent,
        PendingRequests, RootDriver, TaskOrigin, ThinkOutcome, WorkerBuilder, WorkerRole,
    };
}
