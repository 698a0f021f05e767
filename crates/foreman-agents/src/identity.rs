//! Agent identity
//!
//! The immutable descriptor of one running agent: a role `title` shared by
//! every instance of the role, an `identifier` naming this instance, a job
//! description surfaced to callers, and the input/output JSON Schemas that
//! gate the transport boundary.

use anyhow::{Error, anyhow};
use foreman_common::constants::MAILBOX_SEPARATOR;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Static descriptor of an agent instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Role name; many instances may share it
    pub title: String,
    /// Name of this running instance
    pub identifier: String,
    /// What this agent does, shown to callers and helper registries
    pub job_description: String,
    /// JSON Schema an inbound instruction's input must satisfy
    pub input_schema: Value,
    /// JSON Schema of this agent's final answer
    pub output_schema: Value,
}

impl AgentIdentity {
    pub fn new(
        title: impl Into<String>,
        identifier: impl Into<String>,
        job_description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
    ) -> Self {
        AgentIdentity {
            title: title.into(),
            identifier: identifier.into(),
            job_description: job_description.into(),
            input_schema,
            output_schema,
        }
    }

    /// An identity with permissive object schemas, for drivers and tests
    pub fn permissive(
        title: impl Into<String>,
        identifier: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self::new(
            title,
            identifier,
            job_description,
            serde_json::json!({"type": "object"}),
            serde_json::json!({"type": "object"}),
        )
    }

    /// Name of this instance's direct mailbox
    pub fn instance_mailbox(&self) -> String {
        format!("{}{}{}", self.title, MAILBOX_SEPARATOR, self.identifier)
    }

    /// Validate an inbound input against the input schema. Failure here is a
    /// decode error at the transport boundary; the instruction must never
    /// reach the state machine.
    pub fn validate_input(&self, input: &Value) -> Result<(), Error> {
        let compiled = jsonschema::draft202012::new(&self.input_schema)
            .map_err(|e| anyhow!("invalid input schema for {}: {}", self.title, e))?;
        compiled
            .validate(input)
            .map_err(|e| anyhow!("input rejected by {} schema: {}", self.title, e))
    }
}
