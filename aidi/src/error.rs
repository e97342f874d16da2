//! Typed failures that callers distinguish with `downcast_ref`.
//!
//! Everything else travels as plain `anyhow::Error` with context attached.

use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("active service '{0}' has no [services.{0}] table")]
    UnsupportedService(String),
    #[error("service '{service}' needs an API key (set api_key or {env_var})")]
    MissingCredential { service: String, env_var: String },
    #[error("service '{service}' is missing '{field}'")]
    MissingField { service: String, field: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The structured response adapter ran out of attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not decode a valid {shape} after {attempts} attempts: {last_error}")]
pub struct StructuredDecodeError {
    pub shape: &'static str,
    pub attempts: u32,
    pub last_error: String,
}

/// A generated program exited unsuccessfully outside a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{program} exited with {exit_code}: {stderr}")]
pub struct ExecutionFailure {
    pub program: String,
    pub exit_code: i32,
    pub stderr: String,
}
