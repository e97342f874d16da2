//! Whole-tree diff in the deep-diff report style.
//!
//! The walk uses an explicit work stack, so arbitrarily deep documents do not
//! grow the call stack.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::{ComparisonReport, values_equal};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChange {
    pub new_value: Value,
    pub old_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeChange {
    pub old_type: &'static str,
    pub new_type: &'static str,
    pub old_value: Value,
    pub new_value: Value,
}

/// Differences between an old (expected) and a new (actual) tree, keyed by
/// paths such as `root['location'][0]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeDelta {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub dictionary_item_added: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub dictionary_item_removed: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub values_changed: BTreeMap<String, ValueChange>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub type_changes: BTreeMap<String, TypeChange>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub iterable_item_added: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub iterable_item_removed: BTreeMap<String, Value>,
}

impl TreeDelta {
    pub fn is_empty(&self) -> bool {
        self.dictionary_item_added.is_empty()
            && self.dictionary_item_removed.is_empty()
            && self.values_changed.is_empty()
            && self.type_changes.is_empty()
            && self.iterable_item_added.is_empty()
            && self.iterable_item_removed.is_empty()
    }
}

/// Compare two trees; an empty delta is `VALID`, anything else becomes a
/// single serialized diagnostic followed by `INVALID`.
pub fn deep_diff(expected: &Value, actual: &Value) -> ComparisonReport {
    let delta = tree_delta(expected, actual);
    if delta.is_empty() {
        return ComparisonReport::valid();
    }
    let payload = serde_json::to_string(&delta).unwrap_or_else(|err| format!("{delta:?} ({err})"));
    ComparisonReport::from_diagnostics(vec![payload])
}

/// Compute the full delta between `old` and `new`.
pub fn tree_delta(old: &Value, new: &Value) -> TreeDelta {
    let mut delta = TreeDelta::default();
    let mut stack: Vec<(String, &Value, &Value)> = vec![("root".to_string(), old, new)];

    while let Some((path, old, new)) = stack.pop() {
        match (old, new) {
            (Value::Object(old_map), Value::Object(new_map)) => {
                for (key, old_child) in old_map {
                    let child_path = format!("{path}[{}]", quote_key(key));
                    match new_map.get(key) {
                        Some(new_child) => stack.push((child_path, old_child, new_child)),
                        None => {
                            delta.dictionary_item_removed.insert(child_path);
                        }
                    }
                }
                for key in new_map.keys().filter(|key| !old_map.contains_key(*key)) {
                    delta
                        .dictionary_item_added
                        .insert(format!("{path}[{}]", quote_key(key)));
                }
            }
            (Value::Array(old_items), Value::Array(new_items)) => {
                for (index, (old_child, new_child)) in old_items.iter().zip(new_items).enumerate() {
                    stack.push((format!("{path}[{index}]"), old_child, new_child));
                }
                for (index, item) in old_items.iter().enumerate().skip(new_items.len()) {
                    delta
                        .iterable_item_removed
                        .insert(format!("{path}[{index}]"), item.clone());
                }
                for (index, item) in new_items.iter().enumerate().skip(old_items.len()) {
                    delta
                        .iterable_item_added
                        .insert(format!("{path}[{index}]"), item.clone());
                }
            }
            _ => {
                let (old_type, new_type) = (type_name(old), type_name(new));
                if old_type != new_type {
                    delta.type_changes.insert(
                        path,
                        TypeChange {
                            old_type,
                            new_type,
                            old_value: old.clone(),
                            new_value: new.clone(),
                        },
                    );
                } else if !values_equal(old, new) {
                    delta.values_changed.insert(
                        path,
                        ValueChange {
                            new_value: new.clone(),
                            old_value: old.clone(),
                        },
                    );
                }
            }
        }
    }

    delta
}

fn quote_key(key: &str) -> String {
    format!("'{}'", key.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
