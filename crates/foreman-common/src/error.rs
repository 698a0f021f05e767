//! Foreman Common Error Types
//!
//! Centralized error handling for all Foreman components

use std::fmt;

/// Main error type for Foreman operations
#[derive(Debug)]
pub enum ForemanError {
    /// Generic error with message
    Generic(String),
    /// IO-related errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(serde_json::Error),
    /// Episodic log / storage errors
    Memory(String),
    /// Mailbox transport errors
    Transport(String),
    /// Protocol violations (bad envelopes, unroutable correlation)
    Protocol(String),
    /// Agent state machine errors
    Agent(String),
    /// LLM collaborator errors
    Llm(String),
}

impl fmt::Display for ForemanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForemanError::Generic(msg) => write!(f, "Foreman error: {}", msg),
            ForemanError::Io(err) => write!(f, "IO error: {}", err),
            ForemanError::Serde(err) => write!(f, "Serialization error: {}", err),
            ForemanError::Memory(msg) => write!(f, "Memory error: {}", msg),
            ForemanError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ForemanError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ForemanError::Agent(msg) => write!(f, "Agent error: {}", msg),
            ForemanError::Llm(msg) => write!(f, "LLM error: {}", msg),
        }
    }
}

impl std::error::Error for ForemanError {}

/// Convenience result type for Foreman operations
pub type Result<T> = std::result::Result<T, ForemanError>;

// Implement From traits for common error types
impl From<std::io::Error> for ForemanError {
    fn from(err: std::io::Error) -> Self {
        ForemanError::Io(err)
    }
}

impl From<serde_json::Error> for ForemanError {
    fn from(err: serde_json::Error) -> Self {
        ForemanError::Serde(err)
    }
}

impl From<anyhow::Error> for ForemanError {
    fn from(err: anyhow::Error) -> Self {
        ForemanError::Generic(err.to_string())
    }
}
