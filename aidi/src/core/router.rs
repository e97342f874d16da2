//! Turn routing: the pure decision of who speaks next.
//!
//! The router inspects only the typed [`MessageKind`] and the optional tool
//! call of the last message. Marker scanning is done by the worker that
//! produced the message, never here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::profile::OrchestrationProfile;
use crate::core::types::{Message, MessageKind, Role, ValidationStatus};

/// Outcome of one routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Speaker(Role),
    Terminate(TerminateCause),
}

/// Why the router ended the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateCause {
    RoundLimit,
    /// [`FallbackPolicy::Terminate`] applied to a turn with no explicit rule.
    Fallback,
}

/// Selection used when no explicit transition applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Next role in roster order after the last speaker.
    #[default]
    RoundRobin,
    Terminate,
}

/// The last message came from a role that is not part of the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("speaker {0} is not in the active roster")]
pub struct UnknownSpeakerError(pub Role);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRouter {
    roster: Vec<Role>,
    tool_mode: bool,
    max_rounds: u32,
    fallback: FallbackPolicy,
}

impl TurnRouter {
    pub fn new(roster: Vec<Role>, tool_mode: bool, max_rounds: u32, fallback: FallbackPolicy) -> Self {
        Self {
            roster,
            tool_mode,
            max_rounds,
            fallback,
        }
    }

    pub fn for_profile(profile: OrchestrationProfile, max_rounds: u32, fallback: FallbackPolicy) -> Self {
        Self::new(profile.roster(), profile.tool_mode(), max_rounds, fallback)
    }

    pub fn roster(&self) -> &[Role] {
        &self.roster
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Decide the next speaker after `history` at round `round`.
    ///
    /// Reaching `max_rounds` terminates regardless of the transition rules.
    pub fn next(&self, history: &[Message], round: u32) -> Result<Route, UnknownSpeakerError> {
        if round >= self.max_rounds {
            return Ok(Route::Terminate(TerminateCause::RoundLimit));
        }
        let Some(last) = history.last() else {
            return Ok(Route::Speaker(Role::Planner));
        };
        if !self.roster.contains(&last.speaker) {
            return Err(UnknownSpeakerError(last.speaker));
        }
        if history.len() <= 1 {
            return Ok(Route::Speaker(Role::Planner));
        }

        let next = match last.speaker {
            Role::Planner => Role::Coder,
            Role::Coder => match last.kind {
                MessageKind::Code { .. } => Role::Executor,
                _ => Role::Admin,
            },
            Role::Executor => match last.kind {
                MessageKind::Execution { exit_code } if exit_code != 0 => Role::Coder,
                _ => Role::Validator,
            },
            Role::Validator => {
                if last.kind.validation_status() == Some(ValidationStatus::Invalid) {
                    Role::Planner
                } else if last.tool_call.is_some() && self.tool_mode {
                    Role::ToolRunner
                } else {
                    Role::Admin
                }
            }
            Role::ToolRunner if self.tool_mode => Role::Validator,
            speaker => return Ok(self.fallback_route(speaker)),
        };
        Ok(Route::Speaker(next))
    }

    fn fallback_route(&self, last_speaker: Role) -> Route {
        match self.fallback {
            FallbackPolicy::Terminate => Route::Terminate(TerminateCause::Fallback),
            FallbackPolicy::RoundRobin => {
                let position = self
                    .roster
                    .iter()
                    .position(|role| *role == last_speaker)
                    .unwrap_or(0);
                let next = self.roster[(position + 1) % self.roster.len()];
                Route::Speaker(next)
            }
        }
    }
}
