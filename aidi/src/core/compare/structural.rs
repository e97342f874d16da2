//! Key-by-key structural diff of nested mappings.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::{ComparisonReport, values_equal};
use crate::core::pyliteral;

/// Path sentinel for the top-level call.
const ROOT_PATH: &str = "";

/// Walk the union of keys level by level and report every difference.
///
/// `expected` is the reference target data, `actual` the data produced by the
/// generated program. Keys are visited in sorted order.
pub fn structural_diff(expected: &Map<String, Value>, actual: &Map<String, Value>) -> ComparisonReport {
    let mut diagnostics = Vec::new();
    diff_level(expected, actual, ROOT_PATH, &mut diagnostics);
    ComparisonReport::from_diagnostics(diagnostics)
}

fn diff_level(
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<String>,
) {
    let keys: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
    for key in keys {
        let key_path = if path == ROOT_PATH {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        match (expected.get(key), actual.get(key)) {
            (Some(_), None) => {
                diagnostics.push(format!("Key '{key_path}' is missing in target data."));
            }
            (None, Some(_)) => {
                diagnostics.push(format!("Key '{key_path}' must not be in target data."));
            }
            (Some(Value::Object(nested_expected)), Some(Value::Object(nested_actual))) => {
                diff_level(nested_expected, nested_actual, &key_path, diagnostics);
            }
            (Some(left), Some(right)) if !values_equal(left, right) => {
                diagnostics.push(format!(
                    "Value mismatch at '{key_path}': {} != {}",
                    pyliteral::display(left),
                    pyliteral::display(right)
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn identical_trees_are_valid() {
        let data = object(json!({
            "Name_notes": "CV-CV-Abutment-G-P",
            "Asset_Code": "9cf0bb8930ab4d3a9e8082b475796fae",
            "location": {"city_name": "Lakeside", "postal_code": "54321"},
        }));
        assert_eq!(structural_diff(&data, &data).lines(), vec!["VALID"]);
    }

    #[test]
    fn empty_mappings_are_valid() {
        let empty = Map::new();
        assert_eq!(structural_diff(&empty, &empty).lines(), vec!["VALID"]);
    }

    #[test]
    fn missing_key_is_reported() {
        let expected = object(json!({
            "Name_notes": "CV-CV-Abutment-G-P",
            "Asset_Code": "9cf0bb8930ab4d3a9e8082b475796fae",
        }));
        let actual = object(json!({"Name_notes": "CV-CV-Abutment-G-P"}));

        let lines = structural_diff(&expected, &actual).lines();
        assert!(lines.contains(&"Key 'Asset_Code' is missing in target data.".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("INVALID"));
    }

    #[test]
    fn extra_key_and_nested_mismatch_use_dotted_paths() {
        let expected = object(json!({"location": {"city_name": "Lakeside", "postal_code": "54321"}}));
        let actual = object(json!({
            "location": {"city_name": "Seaside", "postal_code": "54321"},
            "extra": true,
        }));

        let lines = structural_diff(&expected, &actual).lines();
        assert_eq!(
            lines,
            vec![
                "Key 'extra' must not be in target data.",
                "Value mismatch at 'location.city_name': Lakeside != Seaside",
                "INVALID",
            ]
        );
    }

    #[test]
    fn verdict_is_appended_exactly_once() {
        let expected = object(json!({"a": {"b": {"c": 1}}}));
        let actual = object(json!({"a": {"b": {"c": 2}}}));

        let lines = structural_diff(&expected, &actual).lines();
        let verdicts = lines
            .iter()
            .filter(|line| *line == "VALID" || *line == "INVALID")
            .count();
        assert_eq!(verdicts, 1);
        assert_eq!(lines[0], "Value mismatch at 'a.b.c': 1 != 2");
    }

    #[test]
    fn mapping_against_scalar_is_a_mismatch() {
        let expected = object(json!({"id": {"value": 1}}));
        let actual = object(json!({"id": 1}));
        let lines = structural_diff(&expected, &actual).lines();
        assert_eq!(lines[0], "Value mismatch at 'id': {'value': 1} != 1");
    }

    #[test]
    fn any_difference_ends_invalid() {
        let base = json!({"a": 1, "b": [1, 2], "c": {"d": null}});
        let variants = [
            json!({"a": 2, "b": [1, 2], "c": {"d": null}}),
            json!({"a": 1, "b": [2, 1], "c": {"d": null}}),
            json!({"a": 1, "b": [1, 2], "c": {}}),
            json!({"a": 1, "b": [1, 2], "c": {"d": false}}),
        ];
        let base = object(base);
        for variant in variants {
            let report = structural_diff(&base, &object(variant));
            assert!(!report.is_valid());
        }
    }
}
