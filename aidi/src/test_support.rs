//! Scripted backends and fixtures for driving conversations in tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::agents::{DataValidationTool, HumanInput};
use crate::core::compare::ComparisonReport;
use crate::core::types::{CodeBlock, Message, MessageKind, Role};
use crate::io::code_exec::{CodeExecutor, ExecutionReport};
use crate::io::completion::{Completion, CompletionRequest, CompletionResponse};
use crate::io::config::AppConfig;

/// Completion backend answering from a fixed queue of responses.
///
/// Every request is recorded. An exhausted queue is an error.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    responses: RefCell<VecDeque<CompletionResponse>>,
    requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_responses(replies.into_iter().map(CompletionResponse::text))
    }

    pub fn from_responses(responses: impl IntoIterator<Item = CompletionResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Completion for ScriptedCompletion {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted completion exhausted"))
    }
}

/// Code executor returning queued `(exit_code, output)` pairs.
#[derive(Debug, Default)]
pub struct ScriptedCodeExecutor {
    reports: RefCell<VecDeque<ExecutionReport>>,
    executed: RefCell<Vec<Vec<CodeBlock>>>,
}

impl ScriptedCodeExecutor {
    pub fn new<I, S>(reports: I) -> Self
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        let reports = reports
            .into_iter()
            .map(|(exit_code, output)| ExecutionReport {
                exit_code,
                output: output.into(),
                timed_out: false,
            })
            .collect();
        Self {
            reports: RefCell::new(reports),
            executed: RefCell::new(Vec::new()),
        }
    }

    /// Blocks of every execution so far, in order.
    pub fn executed(&self) -> Vec<Vec<CodeBlock>> {
        self.executed.borrow().clone()
    }
}

impl CodeExecutor for ScriptedCodeExecutor {
    fn execute(&self, blocks: &[CodeBlock], _timeout: Duration) -> Result<ExecutionReport> {
        self.executed.borrow_mut().push(blocks.to_vec());
        self.reports
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted executor exhausted"))
    }
}

/// Validation tool with one fixed answer.
#[derive(Debug)]
pub struct FixedValidationTool {
    report: ComparisonReport,
    calls: Cell<u32>,
}

impl FixedValidationTool {
    pub fn new(report: ComparisonReport) -> Self {
        Self {
            report,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl DataValidationTool for FixedValidationTool {
    fn validate_data_against_schema(&self) -> Result<ComparisonReport> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.report.clone())
    }
}

/// Human stand-in replaying queued replies; `None` or an empty queue ends the chat.
#[derive(Debug, Default)]
pub struct ScriptedHuman {
    replies: RefCell<VecDeque<Option<String>>>,
    prompts: Cell<usize>,
}

impl ScriptedHuman {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(|reply| reply.map(Into::into)).collect()),
            prompts: Cell::new(0),
        }
    }

    /// How many times a reply was requested.
    pub fn prompts(&self) -> usize {
        self.prompts.get()
    }
}

impl HumanInput for ScriptedHuman {
    fn read_reply(&self, _prompt: &str) -> Result<Option<String>> {
        self.prompts.set(self.prompts.get() + 1);
        Ok(self.replies.borrow_mut().pop_front().flatten())
    }
}

pub fn task_message(text: &str) -> Message {
    Message::new(Role::Admin, MessageKind::Task, text)
}

/// `source` wrapped in a python fence.
pub fn fenced(source: &str) -> String {
    format!("```python\n{source}\n```")
}

/// Coder message carrying one python block.
pub fn code_message(source: &str) -> Message {
    Message::new(
        Role::Coder,
        MessageKind::Code {
            blocks: vec![CodeBlock {
                language: "python".to_string(),
                source: source.to_string(),
            }],
        },
        fenced(source),
    )
}

/// TaskPlan reply with one step per entry.
pub fn plan_reply(steps: &[(u32, &str, &[u32])]) -> String {
    let graph: Vec<_> = steps
        .iter()
        .map(|(id, task, subtasks)| json!({"id": id, "task": task, "subtasks": subtasks}))
        .collect();
    json!({ "task_graph": graph }).to_string()
}

/// ValidatorOutput reply.
pub fn verdict_reply(code_status: &str, explanation: &str) -> String {
    json!({"explanation": explanation, "code_status": code_status}).to_string()
}

/// Temporary project directory with `data/` and `translation_folder/`.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        fs::create_dir_all(dir.path().join("data")).context("create data dir")?;
        fs::create_dir_all(dir.path().join("translation_folder")).context("create code dir")?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_data(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.root().join("data").join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn write_program(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.root().join("translation_folder").join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Default config pointed at this workspace's folders.
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.data.data_folder = self.root().join("data");
        config.code.code_folder = self.root().join("translation_folder");
        config
    }
}
