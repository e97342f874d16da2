//! Deterministic classification of Coder replies.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::CodeBlock;

/// Language assumed for fences without an info string.
pub const DEFAULT_LANGUAGE: &str = "python";

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([\w+-]*)[^\n]*\r?\n(.*?)\r?\n?[ \t]*```").unwrap()
});

/// Fenced code blocks in order of appearance.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let source = caps.get(2)?.as_str();
            if source.trim().is_empty() {
                return None;
            }
            let language = match caps.get(1).map(|m| m.as_str()) {
                Some(lang) if !lang.is_empty() => lang.to_ascii_lowercase(),
                _ => DEFAULT_LANGUAGE.to_string(),
            };
            Some(CodeBlock {
                language,
                source: source.to_string(),
            })
        })
        .collect()
}

/// Whether a Coder reply counts as a code payload: a fence, a `python_code`
/// tag, or the literal word `Python`.
pub fn has_code_markers(text: &str) -> bool {
    text.contains("```") || text.contains("python_code") || text.contains("Python")
}
