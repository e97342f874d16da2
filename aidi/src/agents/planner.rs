//! Planner: proposes the task plan, either as free text or as a TaskGraph.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::profile::PlannerMode;
use crate::core::task_graph::TaskGraph;
use crate::core::types::{Message, Role};
use crate::io::completion::{Completion, CompletionRequest, StructuredMode};
use crate::io::structured::StructuredAdapter;

use super::{Reply, Turn, Worker, chat_history};

pub struct PlannerAgent<'a> {
    completion: &'a dyn Completion,
    system: String,
    mode: PlannerMode,
    structured_mode: StructuredMode,
}

impl<'a> PlannerAgent<'a> {
    pub fn new(
        completion: &'a dyn Completion,
        system: String,
        mode: PlannerMode,
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

impl Worker for PlannerAgent<'_> {
    fn role(&self) -> Role {
        Role::Planner
    }

    #[instrument(skip_all, fields(round = turn.round, mode = ?self.mode))]
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply> {
        let messages = chat_history(Some(&self.system), turn.history, Role::Planner);
        let message = match self.mode {
            PlannerMode::Structured => {
                let message = StructuredAdapter::new(self.completion, self.structured_mode)
                    .request_message::<TaskGraph>(Role::Planner, &messages)?;
                info!("plan decoded");
                message
            }
            PlannerMode::FreeText => {
                let response = self
                    .completion
                    .complete(&CompletionRequest::new(messages))
                    .context("planner completion")?;
                Message::text(Role::Planner, response.content)
            }
        };
        Ok(Reply::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::core::types::MessageKind;
    use crate::test_support::{ScriptedCompletion, task_message};

    #[test]
    fn structured_planner_emits_plan_kind() {
        let completion = ScriptedCompletion::new([
            r#"{"task_graph": [{"id": 1, "task": "map fields", "subtasks": []}]}"#,
        ]);
        let planner = PlannerAgent::new(
            &completion,
            "plan".to_string(),
            PlannerMode::Structured,
            StructuredMode::Native,
        );
        let history = vec![task_message("translate")];
        let ctx = RunContext::new("run-test");
        let reply = planner
            .respond(&Turn { history: &history, round: 1, ctx: &ctx })
            .expect("respond");
        let Reply::Message(message) = reply else {
            panic!("planner must speak");
        };
        let MessageKind::Plan { graph } = &message.kind else {
            panic!("expected plan, got {:?}", message.kind);
        };
        assert_eq!(graph.len(), 1);
        assert!(message.content.contains("\"task_graph\""));
    }

    #[test]
    fn free_text_planner_keeps_reply_verbatim() {
        let completion = ScriptedCompletion::new(["1. read the data\n2. map fields"]);
        let planner = PlannerAgent::new(
            &completion,
            "plan".to_string(),
            PlannerMode::FreeText,
            StructuredMode::Native,
        );
        let history = vec![task_message("translate")];
        let ctx = RunContext::new("run-test");
        let reply = planner
            .respond(&Turn { history: &history, round: 1, ctx: &ctx })
            .expect("respond");
        assert_eq!(
            reply,
            Reply::Message(Message::text(Role::Planner, "1. read the data\n2. map fields"))
        );
        let requests = completion.requests();
        assert_eq!(requests[0].messages[0].content, "plan");
    }
}
