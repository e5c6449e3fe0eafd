use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool name for `Role::Tool` messages.
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            name: None,
            tool_call_id: None,
            tool_calls: calls,
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            name: Some(call.name.clone()),
            tool_call_id: Some(call.id.clone()),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub agent: String,
    pub instructions: String,
    pub memory: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

impl ModelRequest {
    /// Most recent user message.
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }

    /// Tool messages appended after the most recent user message.
    pub fn tool_results(&self) -> Vec<&Message> {
        let start = self
            .messages
            .iter()
            .rposition(|message| message.role == Role::User)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        self.messages[start..]
            .iter()
            .filter(|message| message.role == Role::Tool)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[async_trait]
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse>;
}

type Responder = Arc<dyn Fn(&ModelRequest) -> ModelResponse + Send + Sync>;

/// Deterministic model replaying queued responses, then a fallback.
pub struct ScriptedModel {
    name: String,
    queue: Mutex<VecDeque<ModelResponse>>,
    fallback: Responder,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: Arc::new(|_| ModelResponse::Text(String::new())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(ModelResponse::Text(text.into()))
    }

    pub fn with_tool_call(self, tool: impl Into<String>, args: Value) -> Self {
        let call_id = format!("call-{}", self.queued());
        self.push(ModelResponse::ToolCalls(vec![ToolCall {
            id: call_id,
            name: tool.into(),
            args,
        }]))
    }

    pub fn with_fallback<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> ModelResponse + Send + Sync + 'static,
    {
        self.fallback = Arc::new(responder);
        self
    }

    pub fn into_arc(self) -> Arc<dyn Model> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(self, response: ModelResponse) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    fn queued(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let queued = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(queued.unwrap_or_else(|| (self.fallback)(request)))
    }
}

/// Offline model for credential-free runs.
///
/// First turn: calls every offered tool once, in catalogue order, filling
/// required string arguments with the prompt. Second turn: answers with the
/// prompt, each tool result and any saved memory.
#[derive(Debug, Clone, Default)]
pub struct SimulatedModel;

impl SimulatedModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Model for SimulatedModel {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let prompt = request.prompt().trim().to_string();
        let results = request.tool_results();

        if results.is_empty() && !request.tools.is_empty() {
            let calls = request
                .tools
                .iter()
                .enumerate()
                .map(|(idx, spec)| ToolCall {
                    id: format!("sim-{}-{}", request.agent, idx + 1),
                    name: spec.name.clone(),
                    args: simulated_args(&spec.parameters, &prompt),
                })
                .collect::<Vec<ToolCall>>();
            return Ok(ModelResponse::ToolCalls(calls));
        }

        let mut lines = vec![format!("[{}] {}", request.agent, prompt)];
        for message in results {
            lines.push(format!(
                "{}: {}",
                message.name.as_deref().unwrap_or("tool"),
                message.content.trim()
            ));
        }
        if let Some(memory) = request.memory.as_deref() {
            lines.push(memory.to_string());
        }
        Ok(ModelResponse::Text(lines.join("\n")))
    }
}

fn simulated_args(parameters: &Value, prompt: &str) -> Value {
    let mut args = Map::new();
    let properties = parameters.get("properties").and_then(Value::as_object);
    let required = parameters
        .get("required")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for name in required.iter().filter_map(Value::as_str) {
        let kind = properties
            .and_then(|props| props.get(name))
            .and_then(|prop| prop.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("string");
        let value = match kind {
            "number" | "integer" => json!(0),
            "boolean" => json!(false),
            _ => json!(prompt),
        };
        args.insert(name.to_string(), value);
    }

    Value::Object(args)
}
