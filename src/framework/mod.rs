//! Agent framework boundary.
//!
//! The harness only talks to agents through this surface:
//!
//! - [`AgentConfig`]: name, description, instructions, model, sub-agents,
//!   tools, memory/trace handles, streaming and evaluation flags
//! - [`AgentRuntime::start`]: begins a run and hands back an [`AgentRun`]
//! - [`AgentRun`]: `next()` event iteration, `wait(timeout)`, `approve(id, bool)`
//!
//! [`runtime::LocalRuntime`] is the in-process implementation used by the CLI
//! and the test suite.

pub mod memory;
pub mod model;
pub mod openai;
pub mod runtime;
pub mod tool;
pub mod trace;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::telemetry::unix_ms_now;

pub use memory::Memory;
pub use model::{Model, ModelRequest, ModelResponse, ScriptedModel, SimulatedModel};
pub use tool::{FunctionTool, Tool};
pub use trace::Trace;

/// Execution context shared by runs started from the same harness invocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub trace: Option<Trace>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: format!("session-{}-{}", unix_ms_now(), std::process::id()),
            trace: None,
        }
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration record for one agent and its sub-agents.
#[derive(Clone)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub model: Arc<dyn Model>,
    pub agents: Vec<AgentConfig>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub memory: Option<Memory>,
    pub trace: Option<Trace>,
    pub stream: bool,
    pub enable_evaluation: bool,
}

impl AgentConfig {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|tool| tool.name().to_string())
            .chain(self.agents.iter().map(|agent| agent.name.clone()))
            .collect()
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("model", &self.model.name())
            .field("agents", &self.agents)
            .field("tools", &self.tool_names())
            .field("memory", &self.memory.is_some())
            .field("trace", &self.trace.is_some())
            .field("stream", &self.stream)
            .field("enable_evaluation", &self.enable_evaluation)
            .finish()
    }
}

pub struct AgentBuilder {
    name: String,
    description: String,
    instructions: String,
    model: Option<Arc<dyn Model>>,
    agents: Vec<AgentConfig>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Memory>,
    trace: Option<Trace>,
    stream: bool,
    enable_evaluation: bool,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            model: None,
            agents: Vec::new(),
            tools: Vec::new(),
            memory: None,
            trace: None,
            stream: false,
            enable_evaluation: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn sub_agent(mut self, agent: AgentConfig) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn memory(mut self, memory: Memory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn enable_evaluation(mut self, enabled: bool) -> Self {
        self.enable_evaluation = enabled;
        self
    }

    pub fn build(self) -> Result<AgentConfig> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(anyhow::anyhow!("agent name cannot be empty"));
        }
        let model = self
            .model
            .ok_or_else(|| anyhow::anyhow!("agent '{}' has no model configured", name))?;

        let mut seen = std::collections::BTreeSet::new();
        for tool_name in self
            .tools
            .iter()
            .map(|tool| tool.name().to_string())
            .chain(self.agents.iter().map(|agent| agent.name.clone()))
        {
            if !seen.insert(tool_name.clone()) {
                return Err(anyhow::anyhow!(
                    "agent '{}' declares tool or sub-agent '{}' more than once",
                    name,
                    tool_name
                ));
            }
        }

        Ok(AgentConfig {
            name,
            description: self.description,
            instructions: self.instructions,
            model,
            agents: self.agents,
            tools: self.tools,
            memory: self.memory,
            trace: self.trace,
            stream: self.stream,
            enable_evaluation: self.enable_evaluation,
        })
    }
}

/// Tagged event delivered by a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    Content {
        agent: String,
        chunk: String,
    },
    Tool {
        agent: String,
        tool_name: String,
        args: Value,
        result: Value,
    },
    Approval {
        approval_id: String,
        agent: String,
        tool_name: String,
        args: Value,
    },
    Error {
        message: String,
    },
}

impl RunEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::Content { .. } => "content",
            RunEvent::Tool { .. } => "tool",
            RunEvent::Approval { .. } => "approval",
            RunEvent::Error { .. } => "error",
        }
    }
}

/// Pending approval requests keyed by approval id.
#[derive(Debug, Clone, Default)]
pub struct ApprovalRegistry {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
}

impl ApprovalRegistry {
    pub fn register(&self, approval_id: &str) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(approval_id.to_string(), tx);
        rx
    }

    pub fn resolve(&self, approval_id: &str, approved: bool) -> Result<()> {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(approval_id)
            .ok_or_else(|| anyhow::anyhow!("unknown approval id '{}'", approval_id))?;
        sender
            .send(approved)
            .map_err(|_| anyhow::anyhow!("run is no longer waiting on approval '{}'", approval_id))
    }
}

/// Handle to one in-flight agent execution.
pub struct AgentRun {
    id: String,
    agent: String,
    events: mpsc::Receiver<RunEvent>,
    approvals: ApprovalRegistry,
    task: Option<JoinHandle<()>>,
}

impl AgentRun {
    pub fn new(
        id: impl Into<String>,
        agent: impl Into<String>,
        events: mpsc::Receiver<RunEvent>,
        approvals: ApprovalRegistry,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            events,
            approvals,
            task,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Next event, or `None` once the run has closed its event sequence.
    pub async fn next(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    pub fn approve(&self, approval_id: &str, approved: bool) -> Result<()> {
        self.approvals.resolve(approval_id, approved)
    }

    /// Block until the run finishes and return its text. Approval requests
    /// are denied since nobody is watching the event sequence.
    pub async fn wait(mut self, timeout: Duration) -> Result<String> {
        let run_id = self.id.clone();
        let collect = async {
            let mut text = String::new();
            while let Some(event) = self.next().await {
                match event {
                    RunEvent::Content { chunk, .. } => text.push_str(&chunk),
                    RunEvent::Approval { approval_id, .. } => {
                        self.approve(&approval_id, false)?;
                    }
                    RunEvent::Error { message } => {
                        return Err(anyhow::anyhow!("agent run failed: {message}"));
                    }
                    RunEvent::Tool { .. } => {}
                }
            }
            Ok(text)
        };

        tokio::time::timeout(timeout, collect)
            .await
            .with_context(|| {
                format!(
                    "run '{}' timed out after {}ms",
                    run_id,
                    timeout.as_millis()
                )
            })?
    }
}

impl Drop for AgentRun {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self, agent: &AgentConfig, prompt: &str) -> Result<AgentRun>;
}
