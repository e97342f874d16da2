//! Role workers: each one turns the conversation so far into its next message.

use std::time::Duration;

use anyhow::Result;

use crate::context::RunContext;
use crate::core::profile::OrchestrationProfile;
use crate::core::types::{Message, Role};
use crate::io::code_exec::CodeExecutor;
use crate::io::completion::{ChatMessage, ChatRole, Completion, StructuredMode};
use crate::io::config::AdminInput;
use crate::io::prompt::{PromptSet, introductions};

pub mod admin;
pub mod coder;
pub mod executor;
pub mod planner;
pub mod tool_runner;
pub mod validator;

pub use admin::{AdminAgent, HumanInput, StdinInput};
pub use coder::CoderAgent;
pub use executor::ExecutorAgent;
pub use planner::PlannerAgent;
pub use tool_runner::{DataValidationTool, ToolRunnerAgent};
pub use validator::ValidatorAgent;

/// What a worker sees when it is asked to speak.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub history: &'a [Message],
    pub round: u32,
    pub ctx: &'a RunContext,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Message(Message),
    /// The worker ends the conversation instead of speaking.
    EndConversation,
}

pub trait Worker {
    fn role(&self) -> Role;
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply>;
}

/// Shared history as seen by `own`: its earlier messages become assistant
/// turns, everyone else's become named user turns.
pub fn chat_history(system: Option<&str>, history: &[Message], own: Role) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(system) = system {
        messages.push(ChatMessage::system(system));
    }
    messages.extend(history.iter().map(|message| ChatMessage {
        role: if message.speaker == own {
            ChatRole::Assistant
        } else {
            ChatRole::User
        },
        content: message.content.clone(),
        name: Some(message.speaker.as_str().to_string()),
    }));
    messages
}

/// Capabilities the workers of one run are built from.
pub struct Team<'a> {
    pub completion: &'a dyn Completion,
    pub executor: &'a dyn CodeExecutor,
    pub validation_tool: &'a dyn DataValidationTool,
    pub human: &'a dyn HumanInput,
    pub prompts: &'a PromptSet,
    pub structured_mode: StructuredMode,
    pub admin_input: AdminInput,
    pub code_timeout: Duration,
    pub send_introductions: bool,
}

/// One worker per role in `profile`'s roster, in roster order.
pub fn assemble<'a>(profile: OrchestrationProfile, team: Team<'a>) -> Vec<Box<dyn Worker + 'a>> {
    let roster = profile.roster();
    let intro = team.send_introductions.then(|| introductions(&roster));
    let system = |role: Role| {
        team.prompts.system_message(role, profile).map(|message| match &intro {
            Some(intro) => format!("{message}\n\n{intro}"),
            None => message.to_string(),
        })
    };

    roster
        .iter()
        .map(|&role| -> Box<dyn Worker + 'a> {
            match role {
                Role::Admin => Box::new(AdminAgent::new(team.admin_input, team.human)),
                Role::Planner => Box::new(PlannerAgent::new(
                    team.completion,
                    system(role).unwrap_or_default(),
                    profile.planner_mode(),
                    team.structured_mode,
                )),
                Role::Coder => Box::new(CoderAgent::new(team.completion, system(role).unwrap_or_default())),
                Role::Executor => Box::new(ExecutorAgent::new(team.executor, team.code_timeout)),
                Role::Validator => Box::new(ValidatorAgent::new(
                    team.completion,
                    system(role).unwrap_or_default(),
                    profile.validator_mode(),
                    team.structured_mode,
                )),
                Role::ToolRunner => Box::new(ToolRunnerAgent::new(team.validation_tool)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MessageKind;

    #[test]
    fn history_marks_own_messages_as_assistant() {
        let history = vec![
            Message::new(Role::Admin, MessageKind::Task, "translate"),
            Message::text(Role::Coder, "print(1)"),
        ];
        let messages = chat_history(Some("be brief"), &history, Role::Coder);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].name.as_deref(), Some("Admin"));
        assert_eq!(messages[2].role, ChatRole::Assistant);
    }
}
