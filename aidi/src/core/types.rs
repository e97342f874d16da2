//! Shared deterministic types for conversation and routing logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::compare::ComparisonReport;
use crate::core::task_graph::TaskGraph;

/// Capability slot a worker fills in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Planner,
    Coder,
    Executor,
    Validator,
    ToolRunner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Planner => "Planner",
            Role::Coder => "Coder",
            Role::Executor => "Executor",
            Role::Validator => "Validator",
            Role::ToolRunner => "ToolRunner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary outcome of a validation or comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    #[serde(rename = "VALID")]
    Valid,
    #[serde(rename = "INVALID")]
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "VALID",
            ValidationStatus::Invalid => "INVALID",
        }
    }

    pub fn is_valid(self) -> bool {
        self == ValidationStatus::Valid
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a conversation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A worker ended the conversation.
    Completed,
    /// The round budget ran out first.
    RoundLimitExceeded,
    /// The fallback policy ended a turn no transition rule covered.
    FallbackTerminated,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::RoundLimitExceeded => "round_limit_exceeded",
            StopReason::FallbackTerminated => "fallback_terminated",
        }
    }
}

/// Verdict produced by the Validator worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Explanation of the validation results.
    pub explanation: String,
    /// Whether the translation program and its output were judged valid.
    #[serde(rename = "code_status")]
    pub status: ValidationStatus,
}

/// A fenced code block lifted out of a Coder reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub source: String,
}

/// Pending tool invocation requested by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as emitted by the model.
    pub arguments: String,
}

/// Typed tag attached to a message by the worker that produced it.
///
/// Routing switches on this tag; message text is never re-scanned downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageKind {
    /// Seed task description.
    Task,
    /// Free text with no routing significance.
    Text,
    /// Input typed by the human behind the Admin role.
    Human,
    Plan { graph: TaskGraph },
    Code { blocks: Vec<CodeBlock> },
    Execution { exit_code: i32 },
    Verdict { verdict: ValidationVerdict },
    ToolResult { report: ComparisonReport },
}

impl MessageKind {
    /// True for kinds whose content is the JSON serialization of a typed result.
    pub fn is_structured(&self) -> bool {
        matches!(self, MessageKind::Plan { .. } | MessageKind::Verdict { .. })
    }

    /// Validation status carried by this message, if any.
    pub fn validation_status(&self) -> Option<ValidationStatus> {
        match self {
            MessageKind::Verdict { verdict } => Some(verdict.status),
            MessageKind::ToolResult { report } => Some(report.status),
            _ => None,
        }
    }
}

/// One turn of the conversation. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Role,
    #[serde(flatten)]
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

impl Message {
    pub fn new(speaker: Role, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            speaker,
            kind,
            content: content.into(),
            tool_call: None,
        }
    }

    pub fn text(speaker: Role, content: impl Into<String>) -> Self {
        Self::new(speaker, MessageKind::Text, content)
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_call = Some(call);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_uses_wire_field_names() {
        let verdict: ValidationVerdict =
            serde_json::from_str(r#"{"explanation":"keys differ","code_status":"INVALID"}"#)
                .expect("parse verdict");
        assert_eq!(verdict.status, ValidationStatus::Invalid);
        assert_eq!(verdict.explanation, "keys differ");
    }

    #[test]
    fn message_serializes_kind_inline() {
        let message = Message::new(
            Role::Executor,
            MessageKind::Execution { exit_code: 1 },
            "exitcode: 1 (execution failed)",
        );
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["speaker"], "executor");
        assert_eq!(value["kind"], "execution");
        assert_eq!(value["exit_code"], 1);
        assert!(value.get("tool_call").is_none());
    }
}
