//! Task prompt rendering and per-role system messages.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use minijinja::Environment;
use tracing::debug;

use crate::core::profile::OrchestrationProfile;
use crate::core::types::Role;
use crate::io::config::PromptConfig;
use crate::io::translation_data::{PromptComponent, TranslationData};

const TASK_TEMPLATE: &str = include_str!("prompts/task.md");
const PLANNER_MESSAGE: &str = include_str!("prompts/planner.md");
const CODER_MESSAGE: &str = include_str!("prompts/coder.md");
const VALIDATOR_MESSAGE: &str = include_str!("prompts/validator.md");
const TOOL_VALIDATOR_MESSAGE: &str = include_str!("prompts/tool_validator.md");
const TOOL_RUNNER_MESSAGE: &str = include_str!("prompts/tool_runner.md");

/// Task template plus the system message of every model-backed role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub task_template: String,
    pub planner: String,
    pub coder: String,
    pub validator: String,
    pub tool_validator: String,
    pub tool_runner: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            task_template: TASK_TEMPLATE.to_string(),
            planner: PLANNER_MESSAGE.trim().to_string(),
            coder: CODER_MESSAGE.trim().to_string(),
            validator: VALIDATOR_MESSAGE.trim().to_string(),
            tool_validator: TOOL_VALIDATOR_MESSAGE.trim().to_string(),
            tool_runner: TOOL_RUNNER_MESSAGE.trim().to_string(),
        }
    }
}

impl PromptSet {
    /// Bundled prompts with any configured overrides applied.
    pub fn from_config(config: &PromptConfig) -> Self {
        let bundled = Self::default();
        let pick = |custom: &Option<String>, fallback: String| custom.clone().unwrap_or(fallback);
        Self {
            task_template: pick(&config.prompt_template, bundled.task_template),
            planner: pick(&config.planner_system_message, bundled.planner),
            coder: pick(&config.coder_system_message, bundled.coder),
            validator: pick(&config.validator_system_message, bundled.validator),
            tool_validator: pick(&config.tool_validator_system_message, bundled.tool_validator),
            tool_runner: pick(&config.tool_runner_system_message, bundled.tool_runner),
        }
    }

    /// System message for `role` under `profile`. Admin and Executor have none.
    pub fn system_message(&self, role: Role, profile: OrchestrationProfile) -> Option<&str> {
        match role {
            Role::Planner => Some(&self.planner),
            Role::Coder => Some(&self.coder),
            Role::Validator if profile.tool_mode() => Some(&self.tool_validator),
            Role::Validator => Some(&self.validator),
            Role::ToolRunner => Some(&self.tool_runner),
            Role::Admin | Role::Executor => None,
        }
    }

    pub fn render_task(&self, data: &TranslationData, components: &[PromptComponent]) -> Result<String> {
        render_task_prompt(&self.task_template, data, components)
    }
}

/// Render `template` with the selected components filled in.
///
/// Every placeholder is defined; unselected components render as empty
/// strings so `{% if %}` blocks around them drop out.
pub fn render_task_prompt(
    template: &str,
    data: &TranslationData,
    components: &[PromptComponent],
) -> Result<String> {
    let mut vars: BTreeMap<&'static str, String> = PromptComponent::ALL
        .iter()
        .map(|component| (component.placeholder(), String::new()))
        .collect();
    for &component in components {
        vars.insert(component.placeholder(), data.component_text(component));
    }
    debug!(components = ?components, "rendering task prompt");

    let env = Environment::new();
    let rendered = env.render_str(template, &vars).context("render task prompt")?;
    Ok(rendered.trim().to_string())
}

/// One-line description of a participant, used in introductions.
pub fn role_description(role: Role) -> &'static str {
    match role {
        Role::Admin => "Starts the task and decides when the conversation is over.",
        Role::Planner => "Breaks the translation task into a plan of dependent steps.",
        Role::Coder => "Writes the Python translation program.",
        Role::Executor => "Runs the program and reports its exit code and output.",
        Role::Validator => "Checks the program output against the target data model.",
        Role::ToolRunner => "Executes tool calls requested by the Validator.",
    }
}

/// Greeting listing every participant, sent before the task when enabled.
pub fn introductions(roster: &[Role]) -> String {
    let mut text = String::from(
        "Hello everyone. We have assembled a team to solve a data translation task. In attendance are:\n",
    );
    for role in roster {
        text.push_str(&format!("\n{role}: {}", role_description(*role)));
    }
    text
}
