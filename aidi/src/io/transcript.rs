//! Run transcripts under `<state_dir>/runs/<run_id>/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{Message, StopReason, ValidationStatus};

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub run_id: String,
    pub profile: String,
    pub model: Option<String>,
    pub stop: StopReason,
    pub verdict: Option<ValidationStatus>,
    pub rounds: u32,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
pub fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone)]
pub struct TranscriptPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub messages_path: PathBuf,
}

impl TranscriptPaths {
    pub fn new(state_dir: &Path, run_id: &str) -> Self {
        let dir = state_dir.join("runs").join(run_id);
        Self {
            meta_path: dir.join("meta.json"),
            messages_path: dir.join("transcript.json"),
            dir,
        }
    }
}

pub fn write_transcript(state_dir: &Path, meta: &RunMeta, messages: &[Message]) -> Result<TranscriptPaths> {
    let paths = TranscriptPaths::new(state_dir, &meta.run_id);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create transcript dir {}", paths.dir.display()))?;
    write_json(&paths.meta_path, meta)?;
    write_json(&paths.messages_path, &messages)?;
    Ok(paths)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MessageKind, Role};

    #[test]
    fn duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn transcript_paths_are_stable() {
        let paths = TranscriptPaths::new(Path::new(".aidi"), "run-1");
        assert!(paths.dir.ends_with("runs/run-1"));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.messages_path.ends_with("transcript.json"));
    }

    #[test]
    fn writes_meta_and_messages() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = RunMeta {
            run_id: "run-9".to_string(),
            profile: "structured".to_string(),
            model: Some("gpt-4o".to_string()),
            stop: StopReason::Completed,
            verdict: Some(ValidationStatus::Valid),
            rounds: 4,
            started_at: None,
            ended_at: None,
            duration_ms: Some(12),
        };
        let messages = vec![
            Message::new(Role::Admin, MessageKind::Task, "translate"),
            Message::new(Role::Executor, MessageKind::Execution { exit_code: 0 }, "ok"),
        ];

        let paths = write_transcript(temp.path(), &meta, &messages).expect("write");
        let meta_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.meta_path).expect("read")).expect("parse");
        assert_eq!(meta_json["stop"], "completed");
        assert_eq!(meta_json["verdict"], "VALID");

        let written: Vec<Message> =
            serde_json::from_str(&fs::read_to_string(&paths.messages_path).expect("read")).expect("parse");
        assert_eq!(written, messages);
    }
}
