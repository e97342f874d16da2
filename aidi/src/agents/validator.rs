//! Validator: judges the executed program's output.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::core::profile::ValidatorMode;
use crate::core::types::{Message, MessageKind, Role, ValidationStatus, ValidationVerdict};
use crate::io::completion::{Completion, CompletionRequest, StructuredMode, ToolSpec};
use crate::io::structured::StructuredAdapter;

use super::tool_runner::VALIDATION_TOOL_NAME;
use super::{Reply, Turn, Worker, chat_history};

pub struct ValidatorAgent<'a> {
    completion: &'a dyn Completion,
    system: String,
    mode: ValidatorMode,
    structured_mode: StructuredMode,
}

impl<'a> ValidatorAgent<'a> {
    pub fn new(
        completion: &'a dyn Completion,
        system: String,
        mode: ValidatorMode,
        structured_mode: StructuredMode,
    ) -> Self {
        Self {
            completion,
            system,
            mode,
            structured_mode,
        }
    }
}

pub fn validation_tool_spec() -> ToolSpec {
    ToolSpec {
        name: VALIDATION_TOOL_NAME.to_string(),
        description: "Run the latest generated program and validate its output against the target schema."
            .to_string(),
        parameters: json!({"type": "object", "properties": {}}),
    }
}

static VALID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bVALID\b").unwrap());

/// Verdict read from free text.
///
/// `INVALID` anywhere in the reply marks it invalid. Otherwise a standalone
/// `VALID` token is required; a reply with neither marker carries no verdict.
pub fn verdict_from_text(content: &str) -> Option<ValidationVerdict> {
    let status = if content.contains("INVALID") {
        ValidationStatus::Invalid
    } else if VALID_RE.is_match(content) {
        ValidationStatus::Valid
    } else {
        return None;
    };
    Some(ValidationVerdict {
        explanation: content.trim().to_string(),
        status,
    })
}

/// A verdict message, or plain text when the reply has no marker.
fn free_text_message(content: String) -> Result<Message> {
    match verdict_from_text(&content) {
        Some(verdict) => {
            let content = serde_json::to_string(&verdict).context("serialize verdict")?;
            Ok(Message::new(Role::Validator, MessageKind::Verdict { verdict }, content))
        }
        None => {
            warn!("validator reply has no verdict marker");
            Ok(Message::text(Role::Validator, content))
        }
    }
}

impl Worker for ValidatorAgent<'_> {
    fn role(&self) -> Role {
        Role::Validator
    }

    #[instrument(skip_all, fields(round = turn.round, mode = ?self.mode))]
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply> {
        let messages = chat_history(Some(&self.system), turn.history, Role::Validator);
        let message = match self.mode {
            ValidatorMode::Structured => StructuredAdapter::new(self.completion, self.structured_mode)
                .request_message::<ValidationVerdict>(Role::Validator, &messages)?,
            ValidatorMode::FreeText => {
                let response = self
                    .completion
                    .complete(&CompletionRequest::new(messages))
                    .context("validator completion")?;
                free_text_message(response.content)?
            }
            ValidatorMode::ToolCalling => {
                let request = CompletionRequest::new(messages).with_tools(vec![validation_tool_spec()]);
                let response = self
                    .completion
                    .complete(&request)
                    .context("validator completion")?;
                let invalid = response.content.contains("INVALID");
                match response.tool_calls.into_iter().next() {
                    Some(call) if !invalid => {
                        debug!(tool = %call.name, "validator requested a tool call");
                        Message::text(Role::Validator, response.content).with_tool_call(call)
                    }
                    _ => free_text_message(response.content)?,
                }
            }
        };
        if let Some(status) = message.kind.validation_status() {
            info!(status = %status, "validator verdict");
        }
        Ok(Reply::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::core::types::ToolCall;
    use crate::io::completion::CompletionResponse;
    use crate::test_support::{ScriptedCompletion, task_message};

    fn respond(agent: &ValidatorAgent<'_>) -> Message {
        let history = vec![task_message("translate")];
        let ctx = RunContext::new("run-test");
        match agent
            .respond(&Turn { history: &history, round: 4, ctx: &ctx })
            .expect("respond")
        {
            Reply::Message(message) => message,
            Reply::EndConversation => panic!("validator must speak"),
        }
    }

    #[test]
    fn structured_verdict_is_decoded() {
        let completion =
            ScriptedCompletion::new([r#"{"explanation": "keys differ", "code_status": "INVALID"}"#]);
        let agent = ValidatorAgent::new(
            &completion,
            "validate".to_string(),
            ValidatorMode::Structured,
            StructuredMode::Native,
        );
        let message = respond(&agent);
        assert_eq!(message.kind.validation_status(), Some(ValidationStatus::Invalid));
    }

    fn status(content: &str) -> Option<ValidationStatus> {
        verdict_from_text(content).map(|verdict| verdict.status)
    }

    #[test]
    fn free_text_scans_for_markers() {
        assert_eq!(status("Result: INVALID, key missing"), Some(ValidationStatus::Invalid));
        assert_eq!(status("All keys match. VALID"), Some(ValidationStatus::Valid));
        assert_eq!(status("code_status: VALID."), Some(ValidationStatus::Valid));
    }

    #[test]
    fn reply_without_marker_has_no_verdict() {
        assert_eq!(status(""), None);
        assert_eq!(status("I could not check the data."), None);
        assert_eq!(status("The output looks VALIDated to me"), None);
    }

    #[test]
    fn free_text_reply_without_marker_is_plain_text() {
        let completion = ScriptedCompletion::new(["I could not check the data."]);
        let agent = ValidatorAgent::new(
            &completion,
            "validate".to_string(),
            ValidatorMode::FreeText,
            StructuredMode::Native,
        );
        let message = respond(&agent);
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.kind.validation_status(), None);
        assert_eq!(message.content, "I could not check the data.");
    }

    #[test]
    fn tool_mode_forwards_the_tool_call() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: VALIDATION_TOOL_NAME.to_string(),
            arguments: "{}".to_string(),
        };
        let completion = ScriptedCompletion::from_responses([CompletionResponse {
            content: String::new(),
            tool_calls: vec![call.clone()],
        }]);
        let agent = ValidatorAgent::new(
            &completion,
            "validate".to_string(),
            ValidatorMode::ToolCalling,
            StructuredMode::Native,
        );
        let message = respond(&agent);
        assert_eq!(message.tool_call, Some(call));
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(completion.requests()[0].tools[0].name, VALIDATION_TOOL_NAME);
    }

    #[test]
    fn tool_mode_reports_invalid_tool_results() {
        let completion =
            ScriptedCompletion::new(["Validation error: 'city' is a required property\nINVALID"]);
        let agent = ValidatorAgent::new(
            &completion,
            "validate".to_string(),
            ValidatorMode::ToolCalling,
            StructuredMode::Native,
        );
        let message = respond(&agent);
        assert_eq!(message.kind.validation_status(), Some(ValidationStatus::Invalid));
        assert!(message.tool_call.is_none());
    }
}
