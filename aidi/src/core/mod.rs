//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod code_blocks;
pub mod compare;
pub mod profile;
pub mod pyliteral;
pub mod router;
pub mod session;
pub mod task_graph;
pub mod types;
