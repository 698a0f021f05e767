//! Configuration types and utilities for Foreman

use crate::constants::{DEFAULT_MAX_CONSECUTIVE_THOUGHTS, DEFAULT_PENDING_TTL_SECS};
use serde::{Deserialize, Serialize};

/// Base configuration that all components can use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    pub data_dir: String,
    pub log_level: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Provider configuration for LLM services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (e.g., "openai", "anthropic", "google")
    pub name: String,
    /// API key (optional, can use environment variables)
    pub api_key: Option<String>,
    /// Base URL for API (optional, uses provider default)
    pub base_url: Option<String>,
    /// Default model to use
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            api_key: None,
            base_url: None,
            default_model: "gpt-4".to_string(),
            timeout_seconds: Some(30),
        }
    }
}

/// Tuning knobs for an agent's think loop and request correlation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentTuning {
    /// Budget of non-productive LLM rounds per `think` invocation
    pub max_consecutive_thoughts: usize,
    /// TTL for outstanding help requests, in seconds
    pub pending_ttl_secs: i64,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            max_consecutive_thoughts: DEFAULT_MAX_CONSECUTIVE_THOUGHTS,
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
        }
    }
}
