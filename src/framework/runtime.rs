//! In-process agent runtime.
//!
//! Each run is a tokio task that loops model turns, dispatches tool calls
//! (sub-agents are exposed as tools named after them), parks on approval
//! requests, and finally streams the answer as content events. The event
//! sequence closes when the task drops its sender.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::memory::SAVE_MEMORY_TOOL_NAME;
use super::model::{Message, ModelRequest, ModelResponse, ToolCall, ToolSpec};
use super::tool::{Tool, tool_error_value, tool_result_text};
use super::{AgentConfig, AgentRun, AgentRuntime, ApprovalRegistry, RunEvent, Session, Trace};
use crate::error::redacted_error_chain;
use crate::telemetry::unix_ms_now;

pub const DEFAULT_MAX_TURNS: usize = 8;
pub const DEFAULT_CHUNK_WORDS: usize = 3;
pub const DEFAULT_EVENT_BUFFER: usize = 64;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub max_turns: usize,
    pub chunk_words: usize,
    pub event_buffer: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            chunk_words: DEFAULT_CHUNK_WORDS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalRuntime {
    session: Session,
    options: RuntimeOptions,
}

impl LocalRuntime {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            options: RuntimeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }
}

#[async_trait]
impl AgentRuntime for LocalRuntime {
    fn name(&self) -> &str {
        "local"
    }

    async fn start(&self, agent: &AgentConfig, prompt: &str) -> Result<AgentRun> {
        if prompt.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "cannot start agent '{}' with an empty prompt",
                agent.name
            ));
        }

        let run_id = format!(
            "{}-run-{}-{}",
            self.session.id,
            unix_ms_now(),
            RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let (tx, rx) = mpsc::channel(self.options.event_buffer.max(1));
        let approvals = ApprovalRegistry::default();
        let ctx = RunContext {
            run_id: run_id.clone(),
            events: tx,
            approvals: approvals.clone(),
            trace: agent.trace.clone().or_else(|| self.session.trace.clone()),
            options: self.options,
            approval_seq: Arc::new(AtomicU64::new(1)),
        };

        tracing::info!(
            run_id = %run_id,
            agent = %agent.name,
            stream = agent.stream,
            evaluation = agent.enable_evaluation,
            tools = agent.tools.len(),
            sub_agents = agent.agents.len(),
            "starting agent run"
        );

        let root = agent.clone();
        let prompt = prompt.to_string();
        let task = tokio::spawn(async move { drive_run(ctx, root, prompt).await });

        Ok(AgentRun::new(
            run_id,
            agent.name.clone(),
            rx,
            approvals,
            Some(task),
        ))
    }
}

struct RunContext {
    run_id: String,
    events: mpsc::Sender<RunEvent>,
    approvals: ApprovalRegistry,
    trace: Option<Trace>,
    options: RuntimeOptions,
    approval_seq: Arc<AtomicU64>,
}

impl RunContext {
    async fn send(&self, event: RunEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("run '{}' was abandoned by its consumer", self.run_id))
    }

    fn trace(&self, agent: &str, kind: &str, detail: Value) {
        if let Some(trace) = self.trace.as_ref() {
            trace.record(&self.run_id, agent, kind, detail);
        }
    }
}

async fn drive_run(ctx: RunContext, agent: AgentConfig, prompt: String) {
    ctx.trace(
        &agent.name,
        "run.started",
        json!({
            "prompt": prompt,
            "stream": agent.stream,
            "evaluation": agent.enable_evaluation
        }),
    );

    let outcome = match run_agent(&ctx, &agent, prompt).await {
        Ok(text) => emit_content(&ctx, &agent, &text).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => {
            ctx.trace(&agent.name, "run.completed", json!({}));
            tracing::debug!(run_id = %ctx.run_id, agent = %agent.name, "agent run completed");
        }
        Err(err) => {
            let message = redacted_error_chain(&err);
            ctx.trace(&agent.name, "run.failed", json!({ "error": message }));
            tracing::warn!(run_id = %ctx.run_id, agent = %agent.name, error = %message, "agent run failed");
            let _ = ctx.events.send(RunEvent::Error { message }).await;
        }
    }
}

async fn emit_content(ctx: &RunContext, agent: &AgentConfig, text: &str) -> Result<()> {
    let chunks = if agent.stream {
        chunk_text(text, ctx.options.chunk_words)
    } else if text.is_empty() {
        Vec::new()
    } else {
        vec![text.to_string()]
    };

    for chunk in chunks {
        ctx.send(RunEvent::Content {
            agent: agent.name.clone(),
            chunk,
        })
        .await?;
    }
    Ok(())
}

/// Split text into chunks of at most `words_per_chunk` words. Concatenating
/// the chunks yields the input unchanged.
pub fn chunk_text(text: &str, words_per_chunk: usize) -> Vec<String> {
    let per_chunk = words_per_chunk.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut words = 0usize;

    for piece in text.split_inclusive(char::is_whitespace) {
        if !piece.trim().is_empty() {
            if words == per_chunk {
                chunks.push(std::mem::take(&mut current));
                words = 0;
            }
            words += 1;
        }
        current.push_str(piece);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn resolve_tools(agent: &AgentConfig) -> Vec<Arc<dyn Tool>> {
    let mut tools = agent.tools.clone();
    if let Some(memory) = agent.memory.as_ref()
        && !tools.iter().any(|tool| tool.name() == SAVE_MEMORY_TOOL_NAME)
    {
        tools.push(memory.save_tool());
    }
    tools
}

fn tool_specs(agent: &AgentConfig, tools: &[Arc<dyn Tool>]) -> Vec<ToolSpec> {
    let mut specs = tools
        .iter()
        .map(|tool| ToolSpec {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        })
        .collect::<Vec<ToolSpec>>();

    specs.extend(agent.agents.iter().map(|sub| ToolSpec {
        name: sub.name.clone(),
        description: if sub.description.is_empty() {
            format!("Delegate a task to the '{}' agent", sub.name)
        } else {
            sub.description.clone()
        },
        parameters: json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "Task for the agent" }
            },
            "required": ["input"]
        }),
    }));
    specs
}

type AgentFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

fn run_agent<'a>(ctx: &'a RunContext, agent: &'a AgentConfig, prompt: String) -> AgentFuture<'a> {
    Box::pin(async move {
        let tools = resolve_tools(agent);
        let specs = tool_specs(agent, &tools);
        let mut messages = vec![Message::user(prompt)];

        for turn in 1..=ctx.options.max_turns {
            let request = ModelRequest {
                agent: agent.name.clone(),
                instructions: agent.instructions.clone(),
                memory: agent.memory.as_ref().and_then(|memory| memory.render()),
                messages: messages.clone(),
                tools: specs.clone(),
            };
            ctx.trace(
                &agent.name,
                "model.request",
                json!({ "turn": turn, "messages": messages.len(), "tools": specs.len() }),
            );

            let response = agent.model.generate(&request).await.with_context(|| {
                format!(
                    "model '{}' failed for agent '{}'",
                    agent.model.name(),
                    agent.name
                )
            })?;

            match response {
                ModelResponse::Text(text) => {
                    ctx.trace(
                        &agent.name,
                        "model.text",
                        json!({ "turn": turn, "chars": text.len() }),
                    );
                    return Ok(text);
                }
                ModelResponse::ToolCalls(calls) => {
                    if calls.is_empty() {
                        return Err(anyhow::anyhow!(
                            "model for agent '{}' returned an empty tool call list",
                            agent.name
                        ));
                    }
                    messages.push(Message::assistant_tool_calls(calls.clone()));
                    for call in &calls {
                        let result = dispatch_tool(ctx, agent, &tools, call).await?;
                        messages.push(Message::tool_result(call, tool_result_text(&result)));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "agent '{}' exceeded {} model turns without a final answer",
            agent.name,
            ctx.options.max_turns
        ))
    })
}

async fn dispatch_tool(
    ctx: &RunContext,
    agent: &AgentConfig,
    tools: &[Arc<dyn Tool>],
    call: &ToolCall,
) -> Result<Value> {
    tracing::debug!(
        run_id = %ctx.run_id,
        agent = %agent.name,
        tool = %call.name,
        "dispatching tool call"
    );

    let result = if let Some(sub) = agent.agents.iter().find(|sub| sub.name == call.name) {
        let input = sub_agent_input(&call.args);
        let text = run_agent(ctx, sub, input)
            .await
            .with_context(|| format!("sub-agent '{}' failed", sub.name))?;
        Value::String(text)
    } else if let Some(tool) = tools.iter().find(|tool| tool.name() == call.name) {
        if tool.requires_approval() && !request_approval(ctx, agent, call).await? {
            tool_error_value(format!("tool call '{}' denied", call.name))
        } else {
            match tool.call(call.args.clone()).await {
                Ok(value) => value,
                Err(err) => tool_error_value(format!("{err:#}")),
            }
        }
    } else {
        tool_error_value(format!("unknown tool '{}'", call.name))
    };

    ctx.trace(
        &agent.name,
        "tool.completed",
        json!({ "tool": call.name, "args": call.args, "result": result }),
    );
    ctx.send(RunEvent::Tool {
        agent: agent.name.clone(),
        tool_name: call.name.clone(),
        args: call.args.clone(),
        result: result.clone(),
    })
    .await?;

    Ok(result)
}

async fn request_approval(ctx: &RunContext, agent: &AgentConfig, call: &ToolCall) -> Result<bool> {
    let approval_id = format!(
        "{}-approval-{}",
        ctx.run_id,
        ctx.approval_seq.fetch_add(1, Ordering::Relaxed)
    );
    let decision = ctx.approvals.register(&approval_id);
    ctx.send(RunEvent::Approval {
        approval_id: approval_id.clone(),
        agent: agent.name.clone(),
        tool_name: call.name.clone(),
        args: call.args.clone(),
    })
    .await?;

    // A dropped decision sender counts as a denial.
    let approved = decision.await.unwrap_or(false);
    ctx.trace(
        &agent.name,
        "approval.resolved",
        json!({ "approval_id": approval_id, "tool": call.name, "approved": approved }),
    );
    Ok(approved)
}

fn sub_agent_input(args: &Value) -> String {
    match args.get("input") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => tool_result_text(args),
    }
}
