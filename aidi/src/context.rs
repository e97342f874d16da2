//! Per-run logging context handed to every worker.

use chrono::Local;
use tracing::{Span, info_span};

/// Run identity plus the tracing span that scopes all events of the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub span: Span,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        let span = info_span!("run", run_id = %run_id);
        Self { run_id, span }
    }

    /// Context with a timestamped id such as `run-20240611-142501`.
    pub fn generate() -> Self {
        Self::new(Local::now().format("run-%Y%m%d-%H%M%S").to_string())
    }
}
