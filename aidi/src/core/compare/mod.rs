//! Comparison engine: three independent judges of produced data.
//!
//! Every comparator returns a [`ComparisonReport`]. Its [`lines`](ComparisonReport::lines)
//! end with exactly `"VALID"` or `"INVALID"`, so callers can read the final
//! element as the overall outcome and still inspect the diagnostics before it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::ValidationStatus;

pub mod deep;
pub mod schema;
pub mod structural;

pub use deep::deep_diff;
pub use schema::schema_check;
pub use structural::structural_diff;

/// Verdict plus the ordered differences that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub status: ValidationStatus,
    pub diagnostics: Vec<String>,
}

impl ComparisonReport {
    pub fn valid() -> Self {
        Self {
            status: ValidationStatus::Valid,
            diagnostics: Vec::new(),
        }
    }

    /// `VALID` when no differences were found, `INVALID` otherwise.
    pub fn from_diagnostics(diagnostics: Vec<String>) -> Self {
        let status = if diagnostics.is_empty() {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        };
        Self {
            status,
            diagnostics,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Diagnostics followed by the terminal verdict.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = self.diagnostics.clone();
        lines.push(self.status.as_str().to_string());
        lines
    }
}

/// Equality with Python semantics for numbers (`1 == 1.0`).
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                return true;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lines_end_with_verdict() {
        assert_eq!(ComparisonReport::valid().lines(), vec!["VALID"]);
        let report = ComparisonReport::from_diagnostics(vec!["boom".to_string()]);
        assert_eq!(report.lines(), vec!["boom", "INVALID"]);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(values_equal(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!values_equal(&json!(1), &json!("1")));
    }
}
