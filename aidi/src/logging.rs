//! Tracing setup for the `aidi` binary.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: diagnostics on stderr, plus an optional plain
//!   log file from `[logging] log_file`.
//! - **Transcripts (`io/transcript`)**: product artifacts in `.aidi/runs/`.
//!   Always written, unaffected by the log level.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::io::config::LoggingConfig;

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=aidi=debug aidi run
/// ```
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
