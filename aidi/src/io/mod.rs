//! I/O helpers: configuration, model completions, code execution and run artifacts.

pub mod cache;
pub mod code_exec;
pub mod completion;
pub mod config;
pub mod process;
pub mod program;
pub mod prompt;
pub mod structured;
pub mod transcript;
pub mod translation_data;
