//! Coder: writes the translation program and tags replies that carry code.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::code_blocks::{extract_code_blocks, has_code_markers};
use crate::core::types::{Message, MessageKind, Role};
use crate::io::completion::{Completion, CompletionRequest};

use super::{Reply, Turn, Worker, chat_history};

pub struct CoderAgent<'a> {
    completion: &'a dyn Completion,
    system: String,
}

impl<'a> CoderAgent<'a> {
    pub fn new(completion: &'a dyn Completion, system: String) -> Self {
        Self { completion, system }
    }
}

/// Message for a Coder reply: `Code` when the text carries any code marker,
/// plain `Text` otherwise.
pub fn classify_reply(content: String) -> Message {
    if has_code_markers(&content) {
        let blocks = extract_code_blocks(&content);
        debug!(blocks = blocks.len(), "reply carries code");
        Message::new(Role::Coder, MessageKind::Code { blocks }, content)
    } else {
        Message::text(Role::Coder, content)
    }
}

impl Worker for CoderAgent<'_> {
    fn role(&self) -> Role {
        Role::Coder
    }

    #[instrument(skip_all, fields(round = turn.round))]
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply> {
        let messages = chat_history(Some(&self.system), turn.history, Role::Coder);
        let response = self
            .completion
            .complete(&CompletionRequest::new(messages))
            .context("coder completion")?;
        Ok(Reply::Message(classify_reply(response.content)))
    }
}
