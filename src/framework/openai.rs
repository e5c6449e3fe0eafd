//! OpenAI-compatible chat completions model (also serves Ollama's `/v1` API).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::model::{Message, Model, ModelRequest, ModelResponse, Role, ToolCall};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct OpenAiModel {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiModel {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(anyhow::anyhow!("model name cannot be empty for openai provider"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client for openai provider")?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

pub fn build_chat_body(model: &str, request: &ModelRequest) -> Value {
    let mut system = request.instructions.trim().to_string();
    if let Some(memory) = request.memory.as_deref() {
        if !system.is_empty() {
            system.push_str("\n\n");
        }
        system.push_str(memory);
    }

    let mut messages = Vec::new();
    if !system.is_empty() {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(request.messages.iter().map(chat_message));

    let mut body = json!({ "model": model, "messages": messages });
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(
            request
                .tools
                .iter()
                .map(|spec| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": spec.name,
                            "description": spec.description,
                            "parameters": spec.parameters
                        }
                    })
                })
                .collect(),
        );
    }
    body
}

fn chat_message(message: &Message) -> Value {
    match message.role {
        Role::System => json!({ "role": "system", "content": message.content }),
        Role::User => json!({ "role": "user", "content": message.content }),
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.args.to_string() }
                    })
                })
                .collect::<Vec<Value>>();
            json!({ "role": "assistant", "content": Value::Null, "tool_calls": calls })
        }
        Role::Assistant => json!({ "role": "assistant", "content": message.content }),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content
        }),
    }
}

fn parse_completion(completion: ChatCompletion) -> Result<ModelResponse> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow::anyhow!("chat completion returned no choices"))?;

    let tool_calls = message.tool_calls.unwrap_or_default();
    if !tool_calls.is_empty() {
        let calls = tool_calls
            .into_iter()
            .map(|call| {
                let args = if call.function.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str::<Value>(&call.function.arguments).with_context(
                        || format!("invalid arguments json for tool '{}'", call.function.name),
                    )?
                };
                Ok(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    args,
                })
            })
            .collect::<Result<Vec<ToolCall>>>()?;
        return Ok(ModelResponse::ToolCalls(calls));
    }

    Ok(ModelResponse::Text(message.content.unwrap_or_default()))
}

#[async_trait]
impl Model for OpenAiModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let body = build_chat_body(&self.config.model, request);
        let mut http = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref() {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .with_context(|| format!("provider request to '{}' failed", self.endpoint()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "provider returned HTTP {}: {}",
                status,
                detail.chars().take(400).collect::<String>()
            ));
        }

        let completion = response
            .json::<ChatCompletion>()
            .await
            .context("provider returned an unreadable chat completion")?;
        parse_completion(completion)
    }
}
