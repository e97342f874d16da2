//! Admin: the human proxy. Either ends the conversation or relays human input.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::types::{Message, MessageKind, Role};
use crate::io::config::AdminInput;

use super::{Reply, Turn, Worker};

/// Source of human replies. `None` ends the conversation.
pub trait HumanInput {
    fn read_reply(&self, prompt: &str) -> Result<Option<String>>;
}

/// Reads replies from the terminal; an empty line or `exit` ends the conversation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput;

impl HumanInput for StdinInput {
    fn read_reply(&self, prompt: &str) -> Result<Option<String>> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}").context("write prompt")?;
        stderr.flush().context("flush prompt")?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).context("read human input")?;
        let line = line.trim();
        Ok((!line.is_empty() && line != "exit").then(|| line.to_string()))
    }
}

const HUMAN_PROMPT: &str =
    "Provide feedback to the team. Press enter or type 'exit' to end the conversation: ";

pub struct AdminAgent<'a> {
    mode: AdminInput,
    input: &'a dyn HumanInput,
}

impl<'a> AdminAgent<'a> {
    pub fn new(mode: AdminInput, input: &'a dyn HumanInput) -> Self {
        Self { mode, input }
    }
}

impl Worker for AdminAgent<'_> {
    fn role(&self) -> Role {
        Role::Admin
    }

    #[instrument(skip_all, fields(round = turn.round, mode = ?self.mode))]
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply> {
        let reply = match self.mode {
            AdminInput::Never => None,
            AdminInput::Always => self.input.read_reply(HUMAN_PROMPT)?,
        };
        Ok(match reply {
            Some(text) => Reply::Message(Message::new(Role::Admin, MessageKind::Human, text)),
            None => {
                info!("admin ended the conversation");
                Reply::EndConversation
            }
        })
    }
}
