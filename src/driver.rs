use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::agents::{build_example_agent, default_example_prompt};
use crate::cli::ExampleKind;
use crate::framework::{AgentConfig, AgentRun, AgentRuntime, Memory, Model, RunEvent};
use crate::telemetry::TelemetrySink;

pub const NO_TEXTUAL_RESPONSE: &str = "No textual response produced by the agent.";

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub agent: String,
    pub tool_name: String,
    pub error: Option<String>,
}

/// Everything observed while draining one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub run_id: String,
    pub text: String,
    pub chunks: usize,
    pub tool_calls: Vec<ToolInvocation>,
    pub approvals: Vec<String>,
}

impl RunOutcome {
    pub fn called(&self, tool_name: &str) -> bool {
        self.tool_calls
            .iter()
            .any(|call| call.tool_name == tool_name && call.error.is_none())
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls
            .iter()
            .map(|call| call.tool_name.as_str())
            .collect()
    }

    pub fn display_text(&self) -> &str {
        if self.text.trim().is_empty() {
            NO_TEXTUAL_RESPONSE
        } else {
            &self.text
        }
    }
}

pub fn extract_tool_failure_message(result: &Value) -> Option<String> {
    if let Some(message) = result.get("error").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = result.get("message").and_then(Value::as_str) {
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if status.eq_ignore_ascii_case("error") || status.eq_ignore_ascii_case("failed") {
            return Some(message.to_string());
        }
    }
    None
}

pub fn emit_tool_lifecycle_events(event: &RunEvent, telemetry: &TelemetrySink) {
    match event {
        RunEvent::Tool {
            agent,
            tool_name,
            result,
            ..
        } => {
            telemetry.emit(
                "tool.requested",
                json!({ "tool": tool_name, "agent": agent }),
            );
            if let Some(error_message) = extract_tool_failure_message(result) {
                tracing::warn!(
                    tool = %tool_name,
                    agent = %agent,
                    lifecycle = "failed",
                    error = %error_message,
                    "Tool execution failed"
                );
                telemetry.emit(
                    "tool.failed",
                    json!({ "tool": tool_name, "agent": agent, "error": error_message }),
                );
            } else {
                tracing::info!(
                    tool = %tool_name,
                    agent = %agent,
                    lifecycle = "succeeded",
                    "Tool execution succeeded"
                );
                telemetry.emit(
                    "tool.succeeded",
                    json!({ "tool": tool_name, "agent": agent }),
                );
            }
        }
        RunEvent::Approval {
            agent, tool_name, ..
        } => {
            tracing::info!(
                tool = %tool_name,
                agent = %agent,
                lifecycle = "approval",
                "Tool approval requested"
            );
            telemetry.emit(
                "approval.requested",
                json!({ "tool": tool_name, "agent": agent }),
            );
        }
        RunEvent::Content { .. } | RunEvent::Error { .. } => {}
    }
}

/// Drain a run to completion, approving every approval request. The first
/// error event fails the drain.
pub async fn drain_run(run: &mut AgentRun, telemetry: &TelemetrySink) -> Result<RunOutcome> {
    drain_run_with(run, telemetry, |_| {}).await
}

pub async fn drain_run_with<F>(
    run: &mut AgentRun,
    telemetry: &TelemetrySink,
    mut on_event: F,
) -> Result<RunOutcome>
where
    F: FnMut(&RunEvent),
{
    let mut outcome = RunOutcome {
        run_id: run.id().to_string(),
        ..RunOutcome::default()
    };

    while let Some(event) = run.next().await {
        tracing::debug!(
            run_id = %outcome.run_id,
            agent = %run.agent(),
            kind = event.kind(),
            "run event"
        );
        on_event(&event);
        emit_tool_lifecycle_events(&event, telemetry);
        match event {
            RunEvent::Content { chunk, .. } => {
                if !chunk.is_empty() {
                    outcome.chunks += 1;
                    outcome.text.push_str(&chunk);
                }
            }
            RunEvent::Tool {
                agent,
                tool_name,
                result,
                ..
            } => {
                outcome.tool_calls.push(ToolInvocation {
                    error: extract_tool_failure_message(&result),
                    agent,
                    tool_name,
                });
            }
            RunEvent::Approval {
                approval_id,
                tool_name,
                ..
            } => {
                run.approve(&approval_id, true).with_context(|| {
                    format!("failed to approve '{}' for run '{}'", tool_name, run.id())
                })?;
                telemetry.emit(
                    "approval.granted",
                    json!({ "tool": tool_name, "approval_id": approval_id }),
                );
                outcome.approvals.push(tool_name);
            }
            RunEvent::Error { message } => {
                return Err(anyhow::anyhow!("agent run failed: {message}"));
            }
        }
    }

    tracing::debug!(
        run_id = %outcome.run_id,
        chunks = outcome.chunks,
        tools = outcome.tool_calls.len(),
        approvals = outcome.approvals.len(),
        "run drained"
    );
    Ok(outcome)
}

pub async fn start_and_drain(
    runtime: &dyn AgentRuntime,
    agent: &AgentConfig,
    prompt: &str,
    timeout: Duration,
    telemetry: &TelemetrySink,
) -> Result<RunOutcome> {
    let mut run = runtime.start(agent, prompt).await?;
    let run_id = run.id().to_string();
    tokio::time::timeout(timeout, drain_run(&mut run, telemetry))
        .await
        .with_context(|| format!("run '{}' timed out after {}ms", run_id, timeout.as_millis()))?
}

/// Start a run and block on its final text without watching events.
pub async fn run_to_text(
    runtime: &dyn AgentRuntime,
    agent: &AgentConfig,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    let run = runtime.start(agent, prompt).await?;
    run.wait(timeout).await
}

pub async fn run_example(
    runtime: &dyn AgentRuntime,
    model: std::sync::Arc<dyn Model>,
    kind: ExampleKind,
    prompt: Option<String>,
    timeout: Duration,
    telemetry: &TelemetrySink,
) -> Result<RunOutcome> {
    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| default_example_prompt(kind).to_string());
    let memory = Memory::new();
    let agent = build_example_agent(kind, model, Some(memory.clone()), None)?;

    let mut run = runtime.start(&agent, &prompt).await?;
    let run_id = run.id().to_string();
    let mut stdout = io::stdout();
    let drain = drain_run_with(&mut run, telemetry, |event| match event {
        RunEvent::Content { chunk, .. } => {
            print!("{chunk}");
            let _ = stdout.flush();
        }
        RunEvent::Tool {
            agent,
            tool_name,
            result,
            ..
        } => {
            eprintln!("[tool] {agent} -> {tool_name}: {result}");
        }
        RunEvent::Approval {
            agent, tool_name, ..
        } => {
            eprintln!("[approval] {agent} -> {tool_name}: auto-approved");
        }
        RunEvent::Error { .. } => {}
    });
    let outcome = tokio::time::timeout(timeout, drain)
        .await
        .with_context(|| format!("run '{}' timed out after {}ms", run_id, timeout.as_millis()))??;

    if outcome.chunks == 0 {
        print!("{}", NO_TEXTUAL_RESPONSE);
    }
    println!();
    if let Some(saved) = memory.render() {
        eprintln!("{saved}");
    }
    Ok(outcome)
}
