//! Common constants used across Foreman

/// Default per-`think`-invocation budget of non-productive LLM rounds.
/// Resets on every resumption; bounds consecutive rounds, not conversation
/// lifetime.
pub const DEFAULT_MAX_CONSECUTIVE_THOUGHTS: usize = 5;

/// Default time-to-live for an outstanding help request before the reaper
/// synthesizes a failure response for it, in seconds.
pub const DEFAULT_PENDING_TTL_SECS: i64 = 120;

/// Default sweep interval of the pending-request reaper, in seconds.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 5;

/// Separator between an agent title and instance identifier in an
/// instance-level mailbox name.
pub const MAILBOX_SEPARATOR: char = '_';

/// Name of the local tool that terminates a conversation with an answer.
pub const FINAL_ANSWER_TOOL: &str = "final_answer";

/// Reserved role title for promise-style root callers.
pub const ROOT_TITLE: &str = "root";

/// Common model identifiers
pub mod models {
    // OpenAI models
    pub const GPT_4: &str = "gpt-4";
    pub const GPT_4_TURBO: &str = "gpt-4-turbo";

    // Anthropic models
    pub const CLAUDE_3_OPUS: &str = "claude-3-opus";
    pub const CLAUDE_3_SONNET: &str = "claude-3-sonnet";

    // Google models
    pub const GEMINI_PRO: &str = "gemini-2.5-pro";
}
