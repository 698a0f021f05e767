//! Worker role composition
//!
//! The three roles in the worker hierarchy are configuration layers over one
//! state machine: they differ only in which extra helpers are wired into the
//! tool registry and in the role tag used for log classification. A skilled
//! worker reports to a manager and a QA manager; a manager optionally
//! reports to a manager of its own (root managers have none); a QA manager
//! reports to a manager.

use crate::autonomous::{AgentServices, AutonomousAgent};
use crate::identity::AgentIdentity;
use crate::registry::HelperDescriptor;
use foreman_common::AgentTuning;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which spot in the hierarchy an agent occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    SkilledWorker,
    Manager,
    QaManager,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::SkilledWorker => "skilled_worker",
            WorkerRole::Manager => "manager",
            WorkerRole::QaManager => "qa_manager",
        }
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn manager_descriptor(title: &str) -> HelperDescriptor {
    HelperDescriptor::new(
        title,
        "Your manager. Escalate when the task is outside your skills or you are stuck.",
    )
}

fn qa_descriptor(title: &str) -> HelperDescriptor {
    HelperDescriptor::new(
        title,
        "Your QA manager. Ask for a review of a candidate answer before finalizing it.",
    )
}

/// Create worker agents by role
pub struct WorkerBuilder;

impl WorkerBuilder {
    /// A skilled worker: reports to `manager_title`, reviews with `qa_title`
    pub fn skilled_worker(
        identity: AgentIdentity,
        helpers: Vec<HelperDescriptor>,
        manager_title: &str,
        qa_title: &str,
        services: AgentServices,
        tuning: AgentTuning,
    ) -> Arc<AutonomousAgent> {
        Arc::new(AutonomousAgent::new(
            identity,
            WorkerRole::SkilledWorker,
            helpers,
            Some(manager_descriptor(manager_title)),
            Some(qa_descriptor(qa_title)),
            services,
            tuning,
        ))
    }

    /// A worker manager; root managers pass `None`
    pub fn manager(
        identity: AgentIdentity,
        helpers: Vec<HelperDescriptor>,
        manager_title: Option<&str>,
        services: AgentServices,
        tuning: AgentTuning,
    ) -> Arc<AutonomousAgent> {
        Arc::new(AutonomousAgent::new(
            identity,
            WorkerRole::Manager,
            helpers,
            manager_title.map(manager_descriptor),
            None,
            services,
            tuning,
        ))
    }

    /// A QA manager reporting to `manager_title`
    pub fn qa_manager(
        identity: AgentIdentity,
        helpers: Vec<HelperDescriptor>,
        manager_title: &str,
        services: AgentServices,
        tuning: AgentTuning,
    ) -> Arc<AutonomousAgent> {
        Arc::new(AutonomousAgent::new(
            identity,
            WorkerRole::QaManager,
            helpers,
            Some(manager_descriptor(manager_title)),
            None,
            services,
            tuning,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, MailboxAgent};
    use crate::protocol::{HelpRequest, HelpResponse};
    use anyhow::Error;
    use async_trait::async_trait;
    use foreman_common::constants::FINAL_ANSWER_TOOL;
    use foreman_llm::{ScriptedThinker, Thinker};
    use foreman_memory::{InMemoryEpisodicStore, TemplateLibrary};
    use serde_json::json;

    struct NullEnvironment;

    #[async_trait]
    impl Environment for NullEnvironment {
        async fn register(&self, _agent: Arc<dyn MailboxAgent>) -> Result<(), Error> {
            Ok(())
        }

        async fn send_help_request(&self, _request: HelpRequest) -> Result<(), Error> {
            Ok(())
        }
        async fn send_help_response(
            &self,
            _response: HelpResponse,
            _to_title: &str,
            _to_id: &str,
        ) -> Result<(), Error> {
            Ok(())
        }
        async fn shutdown(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn services() -> AgentServices {
        AgentServices {
            store: Arc::new(InMemoryEpisodicStore::new()),
            templates: Arc::new(TemplateLibrary::new()),
            thinker: Arc::new(ScriptedThinker::from_turns(vec![])) as Arc<dyn Thinker>,
            environment: Arc::new(NullEnvironment),
        }
    }

    #[test]
    fn test_skilled_worker_registry_before_any_task() {
        // Manager, QA manager, and final_answer are all callable
        // before a single instruction arrives.
        let worker = WorkerBuilder::skilled_worker(
            AgentIdentity::permissive("skilled_worker", "w1", "does the work"),
            vec![],
            "mgr",
            "qa",
            services(),
            AgentTuning::default(),
        );

        let titles = worker.helper_registry().titles();
        assert!(titles.contains(&"mgr".to_string()));
        assert!(titles.contains(&"qa".to_string()));
        assert!(titles.contains(&FINAL_ANSWER_TOOL.to_string()));
        assert_eq!(worker.role(), WorkerRole::SkilledWorker);
    }

    #[test]
    fn test_root_manager_has_no_escalation_helper() {
        let root = WorkerBuilder::manager(
            AgentIdentity::permissive("manager", "m1", "coordinates"),
            vec![HelperDescriptor::new("skilled_worker", "delegate work")],
            None,
            services(),
            AgentTuning::default(),
        );

        let titles = root.helper_registry().titles();
        assert_eq!(
            titles,
            vec!["skilled_worker".to_string(), FINAL_ANSWER_TOOL.to_string()]
        );
        assert_eq!(root.role(), WorkerRole::Manager);
    }

    #[test]
    fn test_qa_manager_reports_upward() {
        let qa = WorkerBuilder::qa_manager(
            AgentIdentity::new(
                "qa",
                "q1",
                "reviews answers",
                json!({"type": "object"}),
                json!({"type": "object"}),
            ),
            vec![],
            "mgr",
            services(),
            AgentTuning::default(),
        );

        let titles = qa.helper_registry().titles();
        assert!(titles.contains(&"mgr".to_string()));
        assert_eq!(qa.role(), WorkerRole::QaManager);
        assert_eq!(qa.role().to_string(), "qa_manager");
    }
}
