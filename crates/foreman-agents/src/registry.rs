//! Helper/tool registry
//!
//! Built fresh for every think round from the agent's static configuration:
//! each remote helper title becomes a callable tool, plus the one local
//! `final_answer` tool bound to the agent's own output schema. Lookup is by
//! exact, case-sensitive title; an unknown title is a hallucination handled
//! by the state machine, never an error here.

use crate::identity::AgentIdentity;
use foreman_common::constants::FINAL_ANSWER_TOOL;
use foreman_llm::ToolDef;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Static configuration of one callable remote helper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperDescriptor {
    /// Role title of the helper agent (and the tool name exposed to the LLM)
    pub title: String,
    /// What the helper does, surfaced in the tool definition
    pub description: String,
}

impl HelperDescriptor {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        HelperDescriptor {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// What invoking a registry entry means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperBinding {
    /// Send a Help Request to this role and suspend the conversation
    Remote { title: String },
    /// Record the answer and respond to the task's origin
    FinalAnswer,
}

/// One callable entry: tool definition plus its dispatch binding
#[derive(Debug, Clone)]
pub struct HelperEntry {
    pub def: ToolDef,
    pub binding: HelperBinding,
}

/// The per-round tool registry
#[derive(Debug, Clone)]
pub struct HelperRegistry {
    entries: Vec<HelperEntry>,
}

impl HelperRegistry {
    /// Build the registry for one think round: configured helpers, role
    /// extras, and the final-answer sink bound to the agent's output schema.
    pub fn build(
        identity: &AgentIdentity,
        helpers: &[HelperDescriptor],
        extras: &[HelperDescriptor],
    ) -> Self {
        let mut entries = Vec::with_capacity(helpers.len() + extras.len() + 1);
        for descriptor in helpers.iter().chain(extras.iter()) {
            // A role already present keeps its first registration
            if entries
                .iter()
                .any(|e: &HelperEntry| e.def.name == descriptor.title)
            {
                continue;
            }
            entries.push(HelperEntry {
                def: ToolDef::new(
                    descriptor.title.clone(),
                    descriptor.description.clone(),
                    json!({"type": "object"}),
                ),
                binding: HelperBinding::Remote {
                    title: descriptor.title.clone(),
                },
            });
        }
        entries.push(HelperEntry {
            def: ToolDef::new(
                FINAL_ANSWER_TOOL,
                format!(
                    "Deliver the final answer for this task. {}",
                    identity.job_description
                ),
                identity.output_schema.clone(),
            ),
            binding: HelperBinding::FinalAnswer,
        });
        HelperRegistry { entries }
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, title: &str) -> Option<&HelperEntry> {
        self.entries.iter().find(|e| e.def.name == title)
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.entries.iter().map(|e| e.def.clone()).collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.def.name.clone()).collect()
    }

    /// True when the registry holds nothing beyond the final-answer sink
    pub fn remote_is_empty(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| matches!(e.binding, HelperBinding::Remote { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AgentIdentity {
        AgentIdentity::new(
            "skilled_worker",
            "w1",
            "Works on tasks",
            json!({"type": "object"}),
            json!({"type": "object", "properties": {"answer": {"type": "string"}}}),
        )
    }

    #[test]
    fn test_final_answer_uses_output_schema() {
        let registry = HelperRegistry::build(&identity(), &[], &[]);
        let entry = registry.lookup(FINAL_ANSWER_TOOL).unwrap();
        assert_eq!(entry.binding, HelperBinding::FinalAnswer);
        assert_eq!(entry.def.schema["properties"]["answer"]["type"], "string");
        assert!(registry.remote_is_empty());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let helpers = vec![HelperDescriptor::new("mgr", "the manager")];
        let registry = HelperRegistry::build(&identity(), &helpers, &[]);
        assert!(registry.lookup("mgr").is_some());
        assert!(registry.lookup("Mgr").is_none());
        assert!(registry.lookup("mg").is_none());
    }

    #[test]
    fn test_extras_are_merged_without_duplicates() {
        let helpers = vec![HelperDescriptor::new("mgr", "the manager")];
        let extras = vec![
            HelperDescriptor::new("mgr", "duplicate"),
            HelperDescriptor::new("qa", "the qa manager"),
        ];
        let registry = HelperRegistry::build(&identity(), &helpers, &extras);
        let titles = registry.titles();
        assert_eq!(titles, vec!["mgr", "qa", FINAL_ANSWER_TOOL]);
        assert_eq!(registry.lookup("mgr").unwrap().def.description, "the manager");
    }
}
