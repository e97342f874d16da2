//! Multi-agent translation of a source data model into a target data model.
//!
//! A fixed roster of role workers (Planner, Coder, Executor, Validator and an
//! optional Tool-Runner, plus the human-proxy Admin) takes turns until the
//! generated program's output is judged valid or the round budget runs out.
//!
//! - **[`core`]**: Pure, deterministic logic (turn routing, session log, task
//!   graph, comparison engine). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, completions, code
//!   execution, caching, transcripts). Isolated behind traits for tests.
//!
//! [`agents`] and [`orchestrator`] combine the two into a conversation;
//! [`validate`] runs the comparison engine offline.

pub mod agents;
pub mod context;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
