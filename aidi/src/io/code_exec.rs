//! Local execution of fenced code blocks inside the code folder.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::types::CodeBlock;
use crate::io::cache::content_hash;
use crate::io::process::run_command_with_timeout;

/// Outcome of running a batch of code blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub exit_code: i32,
    pub output: String,
    pub timed_out: bool,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Message text handed back to the conversation.
    pub fn transcript(&self) -> String {
        let outcome = if self.succeeded() {
            "execution succeeded"
        } else {
            "execution failed"
        };
        format!("exitcode: {} ({outcome})\nCode output: {}", self.exit_code, self.output)
    }
}

/// Black-box code execution capability.
pub trait CodeExecutor {
    fn execute(&self, blocks: &[CodeBlock], timeout: Duration) -> Result<ExecutionReport>;
}

/// Writes each block to a file in `work_dir` and runs it with the matching
/// interpreter. Stops at the first failing block.
#[derive(Debug, Clone)]
pub struct LocalCodeExecutor {
    work_dir: PathBuf,
    python: String,
    output_limit_bytes: usize,
}

impl LocalCodeExecutor {
    pub fn new(work_dir: impl Into<PathBuf>, python: impl Into<String>, output_limit_bytes: usize) -> Self {
        Self {
            work_dir: work_dir.into(),
            python: python.into(),
            output_limit_bytes,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn interpreter(&self, language: &str) -> Option<(String, &'static str)> {
        match language {
            "python" | "py" | "python3" => Some((self.python.clone(), "py")),
            "sh" | "bash" | "shell" | "console" => Some(("sh".to_string(), "sh")),
            _ => None,
        }
    }
}

impl CodeExecutor for LocalCodeExecutor {
    #[instrument(skip_all, fields(blocks = blocks.len(), timeout_secs = timeout.as_secs()))]
    fn execute(&self, blocks: &[CodeBlock], timeout: Duration) -> Result<ExecutionReport> {
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("create code folder {}", self.work_dir.display()))?;

        let mut output = String::new();
        for block in blocks {
            let Some((program, extension)) = self.interpreter(&block.language) else {
                output.push_str(&format!("unknown language {}", block.language));
                return Ok(ExecutionReport {
                    exit_code: 1,
                    output,
                    timed_out: false,
                });
            };
            let file_name = target_file_name(&block.source)
                .unwrap_or_else(|| format!("tmp_code_{}.{extension}", content_hash(&block.source)));
            let path = self.work_dir.join(&file_name);
            fs::write(&path, &block.source)
                .with_context(|| format!("write code file {}", path.display()))?;
            info!(file = %path.display(), "executing code block");

            let mut cmd = Command::new(&program);
            cmd.arg(&file_name).current_dir(&self.work_dir);
            let result = run_command_with_timeout(cmd, timeout, self.output_limit_bytes)
                .with_context(|| format!("run {program} {file_name}"))?;
            output.push_str(&result.combined());
            if result.timed_out {
                output.push_str("\nTimeout");
            }
            let exit_code = result.exit_code();
            debug!(exit_code, "code block finished");
            if exit_code != 0 {
                return Ok(ExecutionReport {
                    exit_code,
                    output,
                    timed_out: result.timed_out,
                });
            }
        }
        Ok(ExecutionReport {
            exit_code: 0,
            output,
            timed_out: false,
        })
    }
}

/// File name requested by a leading `# filename: <name>` comment.
///
/// Only the final path component is kept so blocks cannot write outside the
/// code folder.
fn target_file_name(source: &str) -> Option<String> {
    let first = source.lines().next()?.trim();
    let rest = first
        .strip_prefix('#')
        .or_else(|| first.strip_prefix("//"))?
        .trim();
    let name = rest.strip_prefix("filename:")?.trim();
    let name = Path::new(name).file_name()?.to_str()?;
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}
