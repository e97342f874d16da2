//! JSON Schema validation of produced data.

use anyhow::{Result, anyhow};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, validator_for};
use serde_json::Value;

use super::ComparisonReport;
use crate::core::pyliteral;

/// Validate `instance` against `schema`.
///
/// Only the most relevant violation is reported, as
/// `Validation error: <message> at <path>`. A schema that does not compile is
/// an error rather than a verdict.
pub fn schema_check(instance: &Value, schema: &Value) -> Result<ComparisonReport> {
    let compiled = validator_for(schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let Some(err) = compiled.iter_errors(instance).min_by_key(relevance) else {
        return Ok(ComparisonReport::valid());
    };
    let pointer = err.instance_path().to_string();
    let diagnostic = format!(
        "Validation error: {} at {}",
        err,
        render_path(instance, &pointer)
    );
    Ok(ComparisonReport::from_diagnostics(vec![diagnostic]))
}

/// Ordering key for picking one violation out of many: the shallowest
/// instance path wins, then errors that are not `anyOf`/`oneOf` summaries.
/// Ties keep the first reported error.
fn relevance(err: &ValidationError<'_>) -> (usize, bool) {
    let weak = matches!(
        err.kind(),
        ValidationErrorKind::AnyOf { .. }
            | ValidationErrorKind::OneOfNotValid { .. }
            | ValidationErrorKind::OneOfMultipleValid { .. }
    );
    (err.instance_path().iter().count(), weak)
}

/// Render a JSON pointer as a bracketed list: `/address/0` becomes
/// `['address', 0]`. Array indices are recognized by walking `instance`.
fn render_path(instance: &Value, pointer: &str) -> String {
    let mut parts = Vec::new();
    let mut cursor = Some(instance);
    for raw in pointer.split('/').skip(1) {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        match cursor {
            Some(Value::Array(items)) => match segment.parse::<usize>() {
                Ok(index) => {
                    parts.push(index.to_string());
                    cursor = items.get(index);
                }
                Err(_) => {
                    parts.push(pyliteral::repr(&Value::String(segment)));
                    cursor = None;
                }
            },
            Some(Value::Object(map)) => {
                cursor = map.get(&segment);
                parts.push(pyliteral::repr(&Value::String(segment)));
            }
            _ => {
                parts.push(pyliteral::repr(&Value::String(segment)));
                cursor = None;
            }
        }
    }
    format!("[{}]", parts.join(", "))
}
