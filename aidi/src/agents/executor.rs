//! Executor: runs the code blocks of the most recent code message.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::types::{CodeBlock, Message, MessageKind, Role};
use crate::io::code_exec::{CodeExecutor, ExecutionReport};

use super::{Reply, Turn, Worker};

/// How far back the Executor looks for code.
pub const CODE_LOOKBACK: usize = 3;

pub struct ExecutorAgent<'a> {
    executor: &'a dyn CodeExecutor,
    timeout: Duration,
}

impl<'a> ExecutorAgent<'a> {
    pub fn new(executor: &'a dyn CodeExecutor, timeout: Duration) -> Self {
        Self { executor, timeout }
    }
}

/// Blocks of the newest code message among the last [`CODE_LOOKBACK`] messages.
fn recent_blocks(history: &[Message]) -> Option<&[CodeBlock]> {
    history
        .iter()
        .rev()
        .take(CODE_LOOKBACK)
        .find_map(|message| match &message.kind {
            MessageKind::Code { blocks } if !blocks.is_empty() => Some(blocks.as_slice()),
            _ => None,
        })
}

impl Worker for ExecutorAgent<'_> {
    fn role(&self) -> Role {
        Role::Executor
    }

    #[instrument(skip_all, fields(round = turn.round, timeout_secs = self.timeout.as_secs()))]
    fn respond(&self, turn: &Turn<'_>) -> Result<Reply> {
        let report = match recent_blocks(turn.history) {
            Some(blocks) => self.executor.execute(blocks, self.timeout).unwrap_or_else(|err| {
                warn!(err = %err, "code execution failed");
                ExecutionReport {
                    exit_code: 1,
                    output: format!("{err:#}"),
                    timed_out: false,
                }
            }),
            None => ExecutionReport {
                exit_code: 1,
                output: format!("no code blocks found in the last {CODE_LOOKBACK} messages"),
                timed_out: false,
            },
        };
        info!(exit_code = report.exit_code, timed_out = report.timed_out, "execution finished");
        Ok(Reply::Message(Message::new(
            Role::Executor,
            MessageKind::Execution {
                exit_code: report.exit_code,
            },
            report.transcript(),
        )))
    }
}
