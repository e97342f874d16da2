//! Conversation session: the append-only log of turns for a single task.

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{Message, MessageKind, Role, ValidationStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is terminal; no further messages may be appended")]
    Terminal,
    #[error("speaker {0} is not a participant of this session")]
    NotParticipant(Role),
}

/// Ordered messages plus the round counter and participant roster.
///
/// Owned by exactly one orchestrator for the lifetime of a task. Appended
/// messages are never modified.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    messages: Vec<Message>,
    round: u32,
    max_rounds: u32,
    roster: Vec<Role>,
    terminal: bool,
}

impl ConversationSession {
    /// Start a session seeded with the task description spoken by Admin.
    pub fn new(roster: Vec<Role>, max_rounds: u32, task: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::new(Role::Admin, MessageKind::Task, task)],
            round: 0,
            max_rounds,
            roster,
            terminal: false,
        }
    }

    pub fn append(&mut self, message: Message) -> Result<(), SessionError> {
        if self.terminal {
            return Err(SessionError::Terminal);
        }
        if !self.roster.contains(&message.speaker) {
            return Err(SessionError::NotParticipant(message.speaker));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Count one completed round; returns the new round number.
    pub fn advance_round(&mut self) -> u32 {
        self.round += 1;
        self.round
    }

    pub fn terminate(&mut self) {
        self.terminal = true;
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn roster(&self) -> &[Role] {
        &self.roster
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_speaker(&self) -> Option<Role> {
        self.messages.last().map(|message| message.speaker)
    }

    /// Most recent validation status carried by any message.
    pub fn last_verdict(&self) -> Option<ValidationStatus> {
        self.messages
            .iter()
            .rev()
            .find_map(|message| message.kind.validation_status())
    }

    pub fn task(&self) -> &str {
        self.messages
            .first()
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compare::ComparisonReport;

    fn roster() -> Vec<Role> {
        vec![Role::Admin, Role::Coder, Role::Executor]
    }

    #[test]
    fn new_session_is_seeded_by_admin() {
        let session = ConversationSession::new(roster(), 10, "translate");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.last_speaker(), Some(Role::Admin));
        assert_eq!(session.task(), "translate");
        assert_eq!(session.round(), 0);
    }

    #[test]
    fn rejects_non_participants_and_appends_after_termination() {
        let mut session = ConversationSession::new(roster(), 10, "translate");
        assert_eq!(
            session.append(Message::text(Role::Planner, "plan")),
            Err(SessionError::NotParticipant(Role::Planner))
        );
        session.append(Message::text(Role::Coder, "code")).expect("append");
        session.terminate();
        assert_eq!(
            session.append(Message::text(Role::Coder, "more")),
            Err(SessionError::Terminal)
        );
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn last_verdict_tracks_latest_status() {
        let mut session = ConversationSession::new(roster(), 10, "translate");
        assert_eq!(session.last_verdict(), None);
        let report = ComparisonReport::from_diagnostics(vec!["Key 'a' is missing in target data.".into()]);
        session
            .append(Message::new(Role::Executor, MessageKind::ToolResult { report }, "INVALID"))
            .expect("append");
        let report = ComparisonReport::valid();
        session
            .append(Message::new(Role::Executor, MessageKind::ToolResult { report }, "VALID"))
            .expect("append");
        assert_eq!(session.last_verdict(), Some(ValidationStatus::Valid));
    }

    #[test]
    fn rounds_advance_monotonically() {
        let mut session = ConversationSession::new(roster(), 3, "translate");
        assert_eq!(session.advance_round(), 1);
        assert_eq!(session.advance_round(), 2);
        assert_eq!(session.max_rounds(), 3);
    }
}
