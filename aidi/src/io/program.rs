//! The generated translation program on disk: locate, run, rename, and save
//! its output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::pyliteral;
use crate::error::ExecutionFailure;
use crate::io::process::run_command_with_timeout;

pub const FINAL_PROGRAM_NAME: &str = "program_generated_by_AI.py";
pub const GENERATED_DATA_NAME: &str = "generated_target_data.json";

/// Most recently modified non-JSON file in `code_folder`.
pub fn latest_program(code_folder: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(code_folder)
        .with_context(|| format!("read code folder {}", code_folder.display()))?;
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.context("read code folder entry")?;
        let path = entry.path();
        if !entry.file_type().context("stat entry")?.is_file()
            || path.extension().is_some_and(|ext| ext == "json")
        {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .with_context(|| format!("mtime {}", path.display()))?;
        let newer = match &latest {
            Some((best, best_path)) => modified > *best || (modified == *best && path > *best_path),
            None => true,
        };
        if newer {
            latest = Some((modified, path));
        }
    }
    latest
        .map(|(_, path)| path)
        .ok_or_else(|| anyhow!("no program files found in {}", code_folder.display()))
}

/// Run the latest program and parse the dictionary literal it prints.
///
/// A nonzero exit is returned as [`ExecutionFailure`].
#[instrument(skip_all, fields(code_folder = %code_folder.display()))]
pub fn run_latest_program(
    code_folder: &Path,
    python: &str,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<Value> {
    let program = latest_program(code_folder)?;
    info!(program = %program.display(), "running latest program");
    let mut cmd = Command::new(python);
    cmd.arg(&program);
    let output = run_command_with_timeout(cmd, timeout, output_limit_bytes)
        .with_context(|| format!("run {}", program.display()))?;
    if output.exit_code() != 0 {
        return Err(ExecutionFailure {
            program: program.display().to_string(),
            exit_code: output.exit_code(),
            stderr: output.stderr_lossy(),
        }
        .into());
    }
    pyliteral::parse(output.stdout_lossy().trim())
        .with_context(|| format!("parse output of {}", program.display()))
}

/// Rename the latest program to [`FINAL_PROGRAM_NAME`].
pub fn rename_latest_program(code_folder: &Path) -> Result<PathBuf> {
    let program = latest_program(code_folder)?;
    let target = code_folder.join(FINAL_PROGRAM_NAME);
    fs::rename(&program, &target)
        .with_context(|| format!("rename {} to {}", program.display(), target.display()))?;
    Ok(target)
}

/// Write generated data as pretty JSON into the code folder.
pub fn save_generated_data(code_folder: &Path, data: &Value) -> Result<PathBuf> {
    let path = code_folder.join(GENERATED_DATA_NAME);
    let mut payload = serde_json::to_string_pretty(data).context("serialize generated data")?;
    payload.push('\n');
    fs::write(&path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
