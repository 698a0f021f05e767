//! Envelope protocol
//!
//! The two message shapes that cross agent boundaries, with their wire field
//! names. A Help Request travels to a role mailbox and starts a conversation;
//! a Help Response travels back to the exact instance that asked, carrying
//! the caller's conversation id and request id so the right in-flight task
//! resumes.

use crate::identity::AgentIdentity;
use foreman_common::utils::generate_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound request: "do this task and answer me"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequest {
    /// Role title of the agent to answer
    pub helpee_title: String,
    /// Instance identifier of the agent to answer
    pub helpee_id: String,
    /// The sender's conversation id, echoed in the response
    pub task_id: String,
    /// The sender's correlation token, echoed in the response
    pub request_id: String,
    /// Role mailbox this request is addressed to
    pub job_title: String,
    /// Task input, validated against the receiver's input schema
    pub message: Value,
}

impl HelpRequest {
    /// Create a request from one agent's conversation to another agent's role
    /// mailbox, with a fresh correlation token.
    pub fn new(
        helpee: &AgentIdentity,
        task_id: impl Into<String>,
        job_title: impl Into<String>,
        message: Value,
    ) -> Self {
        HelpRequest {
            helpee_title: helpee.title.clone(),
            helpee_id: helpee.identifier.clone(),
            task_id: task_id.into(),
            request_id: generate_id(),
            job_title: job_title.into(),
            message,
        }
    }
}

/// Outcome of a helped task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpStatus {
    Success,
    Failure,
}

/// Reply envelope: routed to the requester's instance mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpResponse {
    /// The **caller's** conversation id (from the request's `task_id`)
    pub task_id: String,
    /// The caller's correlation token, echoed back
    pub request_id: String,
    /// Role title of the agent that did the work
    pub helper_title: String,
    /// Instance identifier of the agent that did the work
    pub helper_identifier: String,
    pub status: HelpStatus,
    pub response: Value,
}

impl HelpResponse {
    /// Create a successful response to a request
    pub fn success(request: &HelpRequest, helper: &AgentIdentity, response: Value) -> Self {
        HelpResponse {
            task_id: request.task_id.clone(),
            request_id: request.request_id.clone(),
            helper_title: helper.title.clone(),
            helper_identifier: helper.identifier.clone(),
            status: HelpStatus::Success,
            response,
        }
    }

    /// Create a failure response carrying an error message
    pub fn failure(request: &HelpRequest, helper: &AgentIdentity, error: impl Into<String>) -> Self {
        HelpResponse {
            task_id: request.task_id.clone(),
            request_id: request.request_id.clone(),
            helper_title: helper.title.clone(),
            helper_identifier: helper.identifier.clone(),
            status: HelpStatus::Failure,
            response: serde_json::json!({"error": error.into()}),
        }
    }

    /// Address a response to a task origin recovered from a `task_start` event
    pub fn to_origin(
        origin: &TaskOrigin,
        helper: &AgentIdentity,
        status: HelpStatus,
        response: Value,
    ) -> Self {
        HelpResponse {
            task_id: origin.helpee_conversation_id.clone(),
            request_id: origin.request_id.clone(),
            helper_title: helper.title.clone(),
            helper_identifier: helper.identifier.clone(),
            status,
            response,
        }
    }
}

/// Messages delivered to an instance mailbox, tagged by type on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectMessage {
    HelpResponse(HelpResponse),
}

/// Who to answer when a conversation ends, captured in its `task_start`
/// event and recovered from the log at answer time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOrigin {
    pub helpee_title: String,
    pub helpee_id: String,
    pub helpee_conversation_id: String,
    pub request_id: String,
}

impl TaskOrigin {
    pub fn from_request(request: &HelpRequest) -> Self {
        TaskOrigin {
            helpee_title: request.helpee_title.clone(),
            helpee_id: request.helpee_id.clone(),
            helpee_conversation_id: request.task_id.clone(),
            request_id: request.request_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_fields() {
        let helpee = AgentIdentity::permissive("root", "r1", "driver");
        let request = HelpRequest::new(&helpee, "c0", "adder", json!({"a": 1, "b": 2}));
        let wire = serde_json::to_value(&request).unwrap();

        assert_eq!(wire["helpee_title"], "root");
        assert_eq!(wire["helpee_id"], "r1");
        assert_eq!(wire["task_id"], "c0");
        assert_eq!(wire["job_title"], "adder");
        assert!(wire["request_id"].is_string());
    }

    #[test]
    fn test_response_echoes_correlation() {
        let helpee = AgentIdentity::permissive("root", "r1", "driver");
        let helper = AgentIdentity::permissive("adder", "a1", "adds");
        let request = HelpRequest::new(&helpee, "c0", "adder", json!({}));

        let response = HelpResponse::success(&request, &helper, json!({"x": 3}));
        assert_eq!(response.task_id, "c0");
        assert_eq!(response.request_id, request.request_id);
        assert_eq!(response.status, HelpStatus::Success);

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["status"], "success");
        assert_eq!(wire["helper_identifier"], "a1");
    }

    #[test]
    fn test_direct_message_tagging() {
        let helpee = AgentIdentity::permissive("root", "r1", "driver");
        let helper = AgentIdentity::permissive("adder", "a1", "adds");
        let request = HelpRequest::new(&helpee, "c0", "adder", json!({}));
        let message = DirectMessage::HelpResponse(HelpResponse::failure(
            &request, &helper, "boom",
        ));

        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(wire["type"], "help_response");
        assert_eq!(wire["status"], "failure");

        let parsed: DirectMessage = serde_json::from_value(wire).unwrap();
        let DirectMessage::HelpResponse(inner) = parsed;
        assert_eq!(inner.response["error"], "boom");
    }
}
