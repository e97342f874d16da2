//! Structured response adapter: turns a free-form completion capability into
//! one that returns typed, schema-checked results.

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::task_graph::TaskGraph;
use crate::core::types::{Message, MessageKind, Role, ValidationVerdict};
use crate::error::StructuredDecodeError;
use crate::io::completion::{
    ChatMessage, Completion, CompletionRequest, ResponseFormat, StructuredMode,
};

pub const MAX_DECODE_ATTEMPTS: u32 = 5;

const TASK_PLAN_SCHEMA: &str = include_str!("../../schemas/task_plan.schema.json");
const VALIDATOR_OUTPUT_SCHEMA: &str = include_str!("../../schemas/validator_output.schema.json");

/// A result shape the adapter can demand from the model.
pub trait StructuredShape: Serialize + DeserializeOwned {
    /// Schema title, also used as the response-format name.
    const NAME: &'static str;
    const SCHEMA: &'static str;

    fn into_kind(self) -> MessageKind;
}

impl StructuredShape for TaskGraph {
    const NAME: &'static str = "TaskPlan";
    const SCHEMA: &'static str = TASK_PLAN_SCHEMA;

    fn into_kind(self) -> MessageKind {
        MessageKind::Plan { graph: self }
    }
}

impl StructuredShape for ValidationVerdict {
    const NAME: &'static str = "ValidatorOutput";
    const SCHEMA: &'static str = VALIDATOR_OUTPUT_SCHEMA;

    fn into_kind(self) -> MessageKind {
        MessageKind::Verdict { verdict: self }
    }
}

pub fn shape_schema<T: StructuredShape>() -> Result<Value> {
    serde_json::from_str(T::SCHEMA).with_context(|| format!("parse bundled {} schema", T::NAME))
}

/// Requests typed output, retrying on every decode failure up to
/// `max_attempts` times with identical inputs.
pub struct StructuredAdapter<'a> {
    completion: &'a dyn Completion,
    mode: StructuredMode,
    max_attempts: u32,
}

impl<'a> StructuredAdapter<'a> {
    pub fn new(completion: &'a dyn Completion, mode: StructuredMode) -> Self {
        Self {
            completion,
            mode,
            max_attempts: MAX_DECODE_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[instrument(skip_all, fields(shape = T::NAME, mode = ?self.mode))]
    pub fn request<T: StructuredShape>(&self, messages: &[ChatMessage]) -> Result<T> {
        let schema = shape_schema::<T>()?;
        let validator =
            validator_for(&schema).map_err(|err| anyhow!("invalid {} schema: {}", T::NAME, err))?;
        let request = self.build_request::<T>(messages, &schema);

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            let response = self
                .completion
                .complete(&request)
                .with_context(|| format!("request {} (attempt {attempt})", T::NAME))?;
            match decode::<T>(&response.content, &validator) {
                Ok(value) => {
                    debug!(attempt, "structured response decoded");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(attempt, err = %err, "structured response rejected");
                    self.completion.reject(&request);
                    last_error = err;
                }
            }
        }
        Err(StructuredDecodeError {
            shape: T::NAME,
            attempts: self.max_attempts,
            last_error,
        }
        .into())
    }

    /// Like [`request`](Self::request) but wraps the result in a structured
    /// message whose content is the result's JSON.
    pub fn request_message<T: StructuredShape>(
        &self,
        speaker: Role,
        messages: &[ChatMessage],
    ) -> Result<Message> {
        let value = self.request::<T>(messages)?;
        let content = serde_json::to_string(&value)
            .with_context(|| format!("serialize {}", T::NAME))?;
        Ok(Message::new(speaker, value.into_kind(), content))
    }

    fn build_request<T: StructuredShape>(
        &self,
        messages: &[ChatMessage],
        schema: &Value,
    ) -> CompletionRequest {
        let mut messages = messages.to_vec();
        let format = match self.mode {
            StructuredMode::Native => ResponseFormat::JsonSchema {
                name: T::NAME.to_string(),
                schema: schema.clone(),
            },
            StructuredMode::Json => {
                messages.push(ChatMessage::system(format!(
                    "Respond only with a JSON object that conforms to this JSON Schema:\n{schema}"
                )));
                ResponseFormat::JsonObject
            }
        };
        CompletionRequest::new(messages).with_format(format)
    }
}

fn decode<T: StructuredShape>(content: &str, validator: &jsonschema::Validator) -> Result<T, String> {
    let document = extract_json(content).ok_or_else(|| "reply contains no JSON object".to_string())?;
    let value: Value =
        serde_json::from_str(document).map_err(|err| format!("reply is not valid JSON: {err}"))?;
    if let Some(err) = validator.iter_errors(&value).next() {
        return Err(format!("schema violation: {err}"));
    }
    serde_json::from_value(value).map_err(|err| err.to_string())
}

/// The JSON object inside a reply, tolerating a surrounding fence or prose.
fn extract_json(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}
