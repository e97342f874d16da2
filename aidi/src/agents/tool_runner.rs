//! Tool-Runner: executes the Validator's tool call and reports the result.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::compare::ComparisonReport;
use crate::core::types::{Message, MessageKind, Role};

use super::{Reply, Turn, Worker};

pub const VALIDATION_TOOL_NAME: &str = "validate_data_against_schema";

/// The data check offered to the Validator as a tool.
pub trait DataValidationTool {
    fn validate_data_against_schema(&self) -> Result<ComparisonReport>;
}

pub struct ToolRunnerAgent<'a> {
    tool: &'a dyn DataValidationTool,
}

impl<'a> ToolRunnerAgent<'a> {
    pub fn new(tool: &'a dyn DataValidationTool) -> Self {
        Self { tool }
    }
}

impl Worker for ToolRunnerAgent<'_> {
    fn role(&self) -> Role {
        Role::ToolRunner
    }

    #[instrument(skip_all, fields(round = turn.round))]
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply> {
        let call = turn.history.last().and_then(|message| message.tool_call.as_ref());
        let message = match call {
            Some(call) if call.name == VALIDATION_TOOL_NAME => {
                let report = self.tool.validate_data_against_schema().unwrap_or_else(|err| {
                    warn!(err = %err, "validation tool failed");
                    ComparisonReport::from_diagnostics(vec![format!("Tool error: {err:#}")])
                });
                info!(status = %report.status, "validation tool finished");
                let content = report.lines().join("\n");
                Message::new(Role::ToolRunner, MessageKind::ToolResult { report }, content)
            }
            Some(call) => Message::text(Role::ToolRunner, format!("Error: tool {} not found.", call.name)),
            None => Message::text(Role::ToolRunner, "No tool call to execute."),
        };
        Ok(Reply::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::core::types::{ToolCall, ValidationStatus};
    use crate::test_support::FixedValidationTool;
    use anyhow::anyhow;

    fn validator_call(name: &str) -> Message {
        Message::text(Role::Validator, "").with_tool_call(ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: "{}".to_string(),
        })
    }

    fn respond(tool: &dyn DataValidationTool, history: &[Message]) -> Message {
        let ctx = RunContext::new("run-test");
        match ToolRunnerAgent::new(tool)
            .respond(&Turn { history, round: 5, ctx: &ctx })
            .expect("respond")
        {
            Reply::Message(message) => message,
            Reply::EndConversation => panic!("tool runner must speak"),
        }
    }

    #[test]
    fn runs_requested_tool() {
        let tool = FixedValidationTool::new(ComparisonReport::valid());
        let message = respond(&tool, &[validator_call(VALIDATION_TOOL_NAME)]);
        assert_eq!(message.kind.validation_status(), Some(ValidationStatus::Valid));
        assert_eq!(message.content, "VALID");
    }

    #[test]
    fn tool_errors_become_invalid_results() {
        struct Failing;
        impl DataValidationTool for Failing {
            fn validate_data_against_schema(&self) -> Result<ComparisonReport> {
                Err(anyhow!("program exited with 1"))
            }
        }
        let message = respond(&Failing, &[validator_call(VALIDATION_TOOL_NAME)]);
        assert_eq!(message.kind.validation_status(), Some(ValidationStatus::Invalid));
        assert!(message.content.starts_with("Tool error: program exited with 1"));
    }

    #[test]
    fn unknown_tools_are_reported() {
        let tool = FixedValidationTool::new(ComparisonReport::valid());
        let message = respond(&tool, &[validator_call("rm_rf")]);
        assert_eq!(message.kind, MessageKind::Text);
        assert!(message.content.contains("rm_rf"));
    }
}
