//! Reference data for a translation task, loaded from the data folder.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::pyliteral::repr;

/// Selectable prompt ingredients, by their short config code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptComponent {
    /// Source data.
    Sd,
    /// Target data.
    Td,
    Sds1,
    Tds1,
    Sds2,
    Tds2,
    /// Source schema.
    Ss,
    /// Target schema.
    Ts,
    /// Source ontology.
    So,
    /// Target ontology.
    To,
}

impl PromptComponent {
    pub const ALL: [PromptComponent; 10] = [
        Self::Sd,
        Self::Td,
        Self::Sds1,
        Self::Tds1,
        Self::Sds2,
        Self::Tds2,
        Self::Ss,
        Self::Ts,
        Self::So,
        Self::To,
    ];

    /// Template variable this component fills.
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Sd => "source_data",
            Self::Td => "target_data",
            Self::Sds1 => "source_data_sample1",
            Self::Tds1 => "target_data_sample1",
            Self::Sds2 => "source_data_sample2",
            Self::Tds2 => "target_data_sample2",
            Self::Ss => "source_schema",
            Self::Ts => "target_schema",
            Self::So => "source_ontology_sample",
            Self::To => "target_ontology_sample",
        }
    }
}

/// Source/target payloads, samples, schemas and ontologies.
///
/// Missing or unreadable JSON files load as empty objects and missing
/// ontologies as empty strings; each case logs a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranslationData {
    pub source_data: Value,
    pub target_data: Value,
    pub source_data_sample1: Value,
    pub target_data_sample1: Value,
    pub source_data_sample2: Value,
    pub target_data_sample2: Value,
    pub source_schema: Value,
    pub target_schema: Value,
    pub source_ontology: String,
    pub target_ontology: String,
}

impl TranslationData {
    pub fn load(data_folder: &Path) -> Self {
        info!(data_folder = %data_folder.display(), "loading translation data");
        let json = |name: &str| load_json_file(&data_folder.join(name));
        let ontology = |name: &str| load_ontology_file(&data_folder.join(name));
        Self {
            source_data: json("source_data.json"),
            target_data: json("target_data.json"),
            source_data_sample1: json("source_data_sample1.json"),
            target_data_sample1: json("target_data_sample1.json"),
            source_data_sample2: json("source_data_sample2.json"),
            target_data_sample2: json("target_data_sample2.json"),
            source_schema: json("source_schema.json"),
            target_schema: json("target_schema.json"),
            source_ontology: ontology("source_ontology.ttl"),
            target_ontology: ontology("target_ontology.ttl"),
        }
    }

    /// Prompt text for `component`: data in Python literal notation and
    /// ontologies verbatim.
    pub fn component_text(&self, component: PromptComponent) -> String {
        match component {
            PromptComponent::Sd => repr(&self.source_data),
            PromptComponent::Td => repr(&self.target_data),
            PromptComponent::Sds1 => repr(&self.source_data_sample1),
            PromptComponent::Tds1 => repr(&self.target_data_sample1),
            PromptComponent::Sds2 => repr(&self.source_data_sample2),
            PromptComponent::Tds2 => repr(&self.target_data_sample2),
            PromptComponent::Ss => repr(&self.source_schema),
            PromptComponent::Ts => repr(&self.target_schema),
            PromptComponent::So => self.source_ontology.clone(),
            PromptComponent::To => self.target_ontology.clone(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn load_json_file(path: &Path) -> Value {
    debug!(path = %path.display(), "loading json file");
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "data file not readable");
            return empty_object();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "invalid json in data file");
            empty_object()
        }
    }
}

fn load_ontology_file(path: &Path) -> String {
    debug!(path = %path.display(), "loading ontology file");
    fs::read_to_string(path).unwrap_or_else(|err| {
        warn!(path = %path.display(), err = %err, "ontology file not readable");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_present_files_and_defaults_the_rest() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("source_data.json"),
            r#"{"Category": "CV-CV-Abutment-G-P"}"#,
        )
        .expect("write");
        fs::write(temp.path().join("target_data.json"), "{not json").expect("write");
        fs::write(temp.path().join("target_ontology.ttl"), "@prefix ex: <http://ex/> .").expect("write");

        let data = TranslationData::load(temp.path());
        assert_eq!(data.source_data, json!({"Category": "CV-CV-Abutment-G-P"}));
        assert_eq!(data.target_data, json!({}));
        assert_eq!(data.source_schema, json!({}));
        assert_eq!(data.source_ontology, "");
        assert!(data.target_ontology.starts_with("@prefix"));
    }

    #[test]
    fn component_text_uses_python_notation() {
        let data = TranslationData {
            source_data: json!({"QTY": 110, "ok": true}),
            ..TranslationData::default()
        };
        assert_eq!(
            data.component_text(PromptComponent::Sd),
            "{'QTY': 110, 'ok': True}"
        );
    }

    #[test]
    fn component_text_keeps_key_order() {
        let data = TranslationData {
            target_schema: serde_json::from_str(r#"{"type": "object", "required": ["b"], "properties": {}}"#)
                .expect("parse"),
            ..TranslationData::default()
        };
        assert_eq!(
            data.component_text(PromptComponent::Ts),
            "{'type': 'object', 'required': ['b'], 'properties': {}}"
        );
    }

    #[test]
    fn component_codes_deserialize() {
        let codes: Vec<PromptComponent> = serde_json::from_str(r#"["sd","tds2","to"]"#).expect("parse");
        assert_eq!(codes, vec![PromptComponent::Sd, PromptComponent::Tds2, PromptComponent::To]);
        assert_eq!(PromptComponent::ALL.len(), 10);
    }
}
