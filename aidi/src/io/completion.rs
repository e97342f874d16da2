//! Chat-completion capability and an OpenAI-compatible HTTP backend.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::core::types::ToolCall;
use crate::io::config::ResolvedService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Participant name, used to tell the workers apart in a shared history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name: None,
        }
    }
}

/// Output constraint requested from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    JsonSchema {
        name: String,
        schema: Value,
    },
    JsonObject,
}

/// A function the model may call instead of answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            response_format: ResponseFormat::Text,
            tools: Vec::new(),
        }
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Black-box completion service.
pub trait Completion {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    /// Forget any stored reply for `request` so the next attempt asks again.
    fn reject(&self, _request: &CompletionRequest) {}
}

/// How the backend is asked for shaped output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredMode {
    /// JSON-schema response format enforced by the service.
    Native,
    /// JSON-object response format plus schema instructions in the prompt.
    Json,
}

/// Client for any service speaking the OpenAI chat-completions protocol.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    pub fn new(service: &ResolvedService) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(service.request_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: service.base_url.clone(),
            api_key: service.api_key.clone(),
            model: service.model.clone(),
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": 0,
        });
        match &request.response_format {
            ResponseFormat::Text => {}
            ResponseFormat::JsonSchema { name, schema } => {
                body["response_format"] = json!({
                    "type": "json_schema",
                    "json_schema": {"name": name, "schema": schema, "strict": false},
                });
            }
            ResponseFormat::JsonObject => {
                body["response_format"] = json!({"type": "json_object"});
            }
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

impl Completion for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&self.request_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .with_context(|| format!("send completion request to {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("completion request failed with {status}: {body}"));
        }
        let payload: Value = resp.json().context("decode completion response")?;
        let response = parse_chat_completion(&payload)?;
        debug!(
            content_len = response.content.len(),
            tool_calls = response.tool_calls.len(),
            "completion received"
        );
        Ok(response)
    }
}

fn parse_chat_completion(payload: &Value) -> Result<CompletionResponse> {
    let message = payload
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("completion response has no choices"))?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    Some(ToolCall {
                        id: call.get("id")?.as_str()?.to_string(),
                        name: call.pointer("/function/name")?.as_str()?.to_string(),
                        arguments: call
                            .pointer("/function/arguments")
                            .and_then(Value::as_str)
                            .unwrap_or("{}")
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(CompletionResponse {
        content,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(&ResolvedService {
            name: "OpenAI".to_string(),
            model: "gpt-4o".to_string(),
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:1".to_string(),
            structured_mode: StructuredMode::Native,
            request_timeout_secs: 5,
        })
        .expect("client")
    }

    #[test]
    fn body_carries_schema_format_and_tools() {
        let request = CompletionRequest::new(vec![ChatMessage::user("plan it")])
            .with_format(ResponseFormat::JsonSchema {
                name: "TaskPlan".to_string(),
                schema: json!({"type": "object"}),
            })
            .with_tools(vec![ToolSpec {
                name: "validate_data_against_schema".to_string(),
                description: "check data".to_string(),
                parameters: json!({"type": "object"}),
            }]);
        let body = client().request_body(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "TaskPlan");
        assert_eq!(body["tools"][0]["function"]["name"], "validate_data_against_schema");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn text_format_omits_response_format() {
        let body = client().request_body(&CompletionRequest::new(vec![ChatMessage::system("hi")]));
        assert!(body.get("response_format").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parses_content_and_tool_calls() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "validate_data_against_schema", "arguments": "{\"a\":1}"}
                    }]
                }
            }]
        });
        let response = parse_chat_completion(&payload).expect("parse");
        assert_eq!(response.content, "");
        assert_eq!(response.tool_calls[0].name, "validate_data_against_schema");
        assert_eq!(response.tool_calls[0].arguments, "{\"a\":1}");
    }

    #[test]
    fn missing_choices_is_an_error() {
        assert!(parse_chat_completion(&json!({"error": "boom"})).is_err());
    }
}
