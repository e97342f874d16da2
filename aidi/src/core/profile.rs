//! Orchestration profiles: the closed set of behaviour variants a session can
//! run under, fixed once at construction.

use serde::{Deserialize, Serialize};

use crate::core::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationProfile {
    /// Free-text planner and validator.
    Plain,
    /// Planner and validator answer with typed, schema-checked results.
    Structured,
    /// Validator delegates the data check to the Tool-Runner.
    ToolValidated,
    /// Structured planner with a tool-calling validator.
    StructuredToolValidated,
}

/// How the Planner produces its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerMode {
    FreeText,
    Structured,
}

/// How the Validator produces its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorMode {
    FreeText,
    Structured,
    ToolCalling,
}

impl OrchestrationProfile {
    pub fn from_flags(structured_output: bool, validation_by_tool: bool) -> Self {
        match (structured_output, validation_by_tool) {
            (false, false) => Self::Plain,
            (true, false) => Self::Structured,
            (false, true) => Self::ToolValidated,
            (true, true) => Self::StructuredToolValidated,
        }
    }

    pub fn planner_mode(self) -> PlannerMode {
        match self {
            Self::Structured | Self::StructuredToolValidated => PlannerMode::Structured,
            Self::Plain | Self::ToolValidated => PlannerMode::FreeText,
        }
    }

    /// Tool calling takes precedence over structured output for the Validator.
    pub fn validator_mode(self) -> ValidatorMode {
        match self {
            Self::ToolValidated | Self::StructuredToolValidated => ValidatorMode::ToolCalling,
            Self::Structured => ValidatorMode::Structured,
            Self::Plain => ValidatorMode::FreeText,
        }
    }

    pub fn tool_mode(self) -> bool {
        self.validator_mode() == ValidatorMode::ToolCalling
    }

    /// Participants in roster order. The Tool-Runner only joins in tool mode.
    pub fn roster(self) -> Vec<Role> {
        let mut roster = vec![
            Role::Admin,
            Role::Coder,
            Role::Validator,
            Role::Executor,
            Role::Planner,
        ];
        if self.tool_mode() {
            roster.push(Role::ToolRunner);
        }
        roster
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Structured => "structured",
            Self::ToolValidated => "tool_validated",
            Self::StructuredToolValidated => "structured_tool_validated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_select_profile() {
        assert_eq!(OrchestrationProfile::from_flags(false, false), OrchestrationProfile::Plain);
        assert_eq!(
            OrchestrationProfile::from_flags(true, true),
            OrchestrationProfile::StructuredToolValidated
        );
    }

    #[test]
    fn tool_mode_overrides_structured_validator() {
        let profile = OrchestrationProfile::StructuredToolValidated;
        assert_eq!(profile.planner_mode(), PlannerMode::Structured);
        assert_eq!(profile.validator_mode(), ValidatorMode::ToolCalling);
    }

    #[test]
    fn tool_runner_joins_roster_only_in_tool_mode() {
        assert!(!OrchestrationProfile::Structured.roster().contains(&Role::ToolRunner));
        assert!(OrchestrationProfile::ToolValidated.roster().contains(&Role::ToolRunner));
        assert_eq!(OrchestrationProfile::Plain.roster().len(), 5);
    }
}
