//! Offline validation of the generated program's output.

use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use serde_json::Value;
use tracing::{info, instrument};

use crate::agents::DataValidationTool;
use crate::core::compare::{ComparisonReport, deep_diff, schema_check, structural_diff, values_equal};
use crate::core::pyliteral;
use crate::io::config::{AppConfig, CodeConfig};
use crate::io::program::run_latest_program;
use crate::io::translation_data::TranslationData;

/// Comparator used by `aidi validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValidationMethod {
    /// Key-by-key diff against `target_data.json`.
    Structural,
    /// Whole-tree diff against `target_data.json`.
    Deep,
    /// JSON Schema check against `target_schema.json`.
    Schema,
}

/// Compare generated data with the reference data using `method`.
pub fn compare(method: ValidationMethod, generated: &Value, data: &TranslationData) -> Result<ComparisonReport> {
    match method {
        ValidationMethod::Structural => Ok(structural_compare(&data.target_data, generated)),
        ValidationMethod::Deep => Ok(deep_diff(&data.target_data, generated)),
        ValidationMethod::Schema => schema_check(generated, &data.target_schema),
    }
}

fn structural_compare(expected: &Value, actual: &Value) -> ComparisonReport {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => structural_diff(expected, actual),
        _ if values_equal(expected, actual) => ComparisonReport::valid(),
        _ => ComparisonReport::from_diagnostics(vec![format!(
            "Value mismatch at '': {} != {}",
            pyliteral::display(expected),
            pyliteral::display(actual)
        )]),
    }
}

/// Run the latest program in the code folder and compare its output.
///
/// A failing program is an error here, not a verdict.
#[instrument(skip_all, fields(method = ?method))]
pub fn validate_target_data(config: &AppConfig, method: ValidationMethod) -> Result<ComparisonReport> {
    let data = TranslationData::load(&config.data.data_folder);
    let generated = run_program(&config.code)?;
    let report = compare(method, &generated, &data)?;
    info!(status = %report.status, diagnostics = report.diagnostics.len(), "validation finished");
    Ok(report)
}

fn run_program(code: &CodeConfig) -> Result<Value> {
    run_latest_program(
        &code.code_folder,
        &code.python,
        Duration::from_secs(code.timeout_secs),
        code.output_limit_bytes,
    )
}

/// The Validator's tool: run the latest program and schema-check its output.
pub struct SchemaValidationTool<'a> {
    code: &'a CodeConfig,
    target_schema: &'a Value,
}

impl<'a> SchemaValidationTool<'a> {
    pub fn new(code: &'a CodeConfig, target_schema: &'a Value) -> Self {
        Self { code, target_schema }
    }
}

impl DataValidationTool for SchemaValidationTool<'_> {
    fn validate_data_against_schema(&self) -> Result<ComparisonReport> {
        let generated = run_program(self.code)?;
        schema_check(&generated, self.target_schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> TranslationData {
        TranslationData {
            target_data: json!({"Name_notes": "Abutment", "Asset_Code": "CV-CV-Abutment-G-P"}),
            target_schema: json!({
                "type": "object",
                "required": ["Asset_Code"],
                "properties": {"Asset_Code": {"type": "string"}}
            }),
            ..TranslationData::default()
        }
    }

    #[test]
    fn structural_reports_missing_key() {
        let report = compare(ValidationMethod::Structural, &json!({"Name_notes": "Abutment"}), &data())
            .expect("compare");
        assert_eq!(
            report.lines(),
            vec!["Key 'Asset_Code' is missing in target data.", "INVALID"]
        );
    }

    #[test]
    fn structural_handles_non_objects() {
        let report = structural_compare(&json!({"a": 1}), &json!([1]));
        assert_eq!(report.lines(), vec!["Value mismatch at '': {'a': 1} != [1]", "INVALID"]);
        assert!(structural_compare(&json!(1), &json!(1.0)).is_valid());
    }

    #[test]
    fn schema_and_deep_methods_agree_on_identical_data() {
        let generated = data().target_data;
        assert!(compare(ValidationMethod::Schema, &generated, &data()).expect("schema").is_valid());
        assert!(compare(ValidationMethod::Deep, &generated, &data()).expect("deep").is_valid());
    }

    #[cfg(unix)]
    #[test]
    fn tool_runs_program_and_checks_schema() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("translate.sh"), "echo \"{'Asset_Code': 7}\"").expect("write");
        let code = CodeConfig {
            code_folder: temp.path().to_path_buf(),
            python: "sh".to_string(),
            ..CodeConfig::default()
        };
        let schema = data().target_schema;
        let report = SchemaValidationTool::new(&code, &schema)
            .validate_data_against_schema()
            .expect("validate");
        assert!(!report.is_valid());
        assert!(report.diagnostics[0].contains("['Asset_Code']"));
    }
}
