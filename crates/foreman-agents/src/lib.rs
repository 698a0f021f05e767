//! Foreman Agents
//!
//! The core of the framework: the envelope protocol that crosses agent
//! boundaries, the mailbox transport, the LLM-driven agent state machine and
//! its deterministic sibling, worker-role composition, and the
//! outstanding-request table used by promise-style callers.

pub mod autonomous;
pub mod code_agent;
pub mod directory;
pub mod driver;
pub mod environment;
pub mod identity;
pub mod pending;
pub mod protocol;
pub mod registry;
pub mod worker;

pub use autonomous::{AgentServices, AutonomousAgent, ThinkOutcome};
pub use code_agent::{Builtin, CodeAgent, CodeBehavior, CodeTask};
pub use directory::AgentDirectory;
pub use driver::RootDriver;
pub use environment::{Environment, InProcessEnvironment, MailboxAgent};
pub use identity::AgentIdentity;
pub use pending::PendingRequests;
pub use protocol::{DirectMessage, HelpRequest, HelpResponse, HelpStatus, TaskOrigin};
pub use registry::{HelperDescriptor, HelperEntry, HelperRegistry};
pub use worker::{WorkerBuilder, WorkerRole};
