//! Foreman Memory
//!
//! The episodic event log consumed by the agent state machines: an
//! append-only, per-conversation ordered record of everything that happened
//! in a task, plus the small template blobs (plan / instructions) agents
//! resolve at task start. Storage backends are swappable behind the
//! `EpisodicStore` trait; state must always be reconstructible from the log
//! alone.

pub mod event;
pub mod fjall_store;
pub mod in_memory;
pub mod store;

pub use event::{Actor, CallData, EpisodicEvent, EventKind, render_transcript};
pub use fjall_store::FjallEpisodicStore;
pub use in_memory::InMemoryEpisodicStore;
pub use store::{EpisodicStore, TemplateLibrary, TemplateStore};
