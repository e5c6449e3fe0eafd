//! Benchmark scenarios exercising the agent runtime end to end.
//!
//! Every scenario builds its agent from [`crate::agents`], drives one or more
//! runs through [`crate::driver`], and turns the observations into a
//! [`BenchmarkResult`]. Scenarios run sequentially; a failing scenario never
//! stops the ones after it.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::agents::{self, CHAIN_EXPERTS, TEAM_SPECIALISTS, tools};
use crate::checks::{contains_ignore_case, ensure_in_order};
use crate::cli::{BenchmarkName, Provider};
use crate::config::RuntimeConfig;
use crate::driver::{drain_run, run_to_text, start_and_drain};
use crate::error::redacted_error_chain;
use crate::framework::runtime::LocalRuntime;
use crate::framework::{AgentRuntime, Memory, Model, Session, Trace};
use crate::provider::resolve_model;
use crate::table::{Column, render_table, truncate_cell};
use crate::telemetry::{TelemetrySink, unix_ms_now};

pub const DEFAULT_BENCH_OUTPUT_PATH: &str = ".aigentic-bench/bench/latest.json";
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);

const SIMPLE_PROMPT: &str = "What is the capital of France?";
const TOOL_PROMPT: &str = "What is the name of the company with id 150?";
const TEAM_PROMPT: &str = "Should a small team adopt Rust for a new command line tool?";
const CHAIN_PROMPT: &str = "Start the chain with the word 'begin'.";
const STREAMING_PROMPT: &str = "What is the capital of France? Answer in two sentences.";
const STREAMING_TOOL_PROMPT: &str =
    "Which company has id 150? Answer in two sentences that include its name.";
const MEMORY_SAVE_PROMPT: &str = "Remember that my favourite colour is blue.";
const MEMORY_RECALL_PROMPT: &str = "What is my favourite colour?";
const APPROVAL_PROMPT: &str = "Notify ops@example.com that the nightly build passed.";

pub type Metadata = BTreeMap<String, Value>;

/// Everything a scenario needs: where to start runs and which model to wire
/// into the example agents.
#[derive(Clone)]
pub struct BenchContext {
    pub runtime: Arc<dyn AgentRuntime>,
    pub model: Arc<dyn Model>,
    pub provider: Provider,
    pub telemetry: TelemetrySink,
    pub run_timeout: Duration,
    pub concurrent_runs: usize,
}

impl BenchContext {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        model: Arc<dyn Model>,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            runtime,
            model,
            provider: Provider::Simulated,
            telemetry,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            concurrent_runs: crate::config::DEFAULT_CONCURRENT_RUNS,
        }
    }

    pub fn from_config(cfg: &RuntimeConfig, telemetry: TelemetrySink) -> Result<Self> {
        let (model, provider, model_name) = resolve_model(cfg)?;
        let mut session = Session::with_id(cfg.session_id.clone());
        if let Some(path) = cfg.trace_path.as_ref() {
            session = session.with_trace(Trace::to_file(path));
        }
        let runtime = LocalRuntime::new(session).with_options(cfg.runtime_options());

        tracing::info!(
            provider = ?provider,
            model = %model_name,
            session_id = %cfg.session_id,
            "benchmark context ready"
        );

        Ok(Self {
            runtime: Arc::new(runtime),
            model,
            provider,
            telemetry,
            run_timeout: Duration::from_secs(cfg.run_timeout_secs),
            concurrent_runs: cfg.concurrent_runs.max(1),
        })
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn with_concurrent_runs(mut self, concurrent_runs: usize) -> Self {
        self.concurrent_runs = concurrent_runs.max(1);
        self
    }

    pub fn model_label(&self) -> String {
        format!("{:?}/{}", self.provider, self.model.name()).to_ascii_lowercase()
    }
}

pub fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(crate::eval::round_metric(duration.as_secs_f64() * 1000.0))
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: Metadata,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

impl BenchmarkResult {
    pub fn passed(name: impl Into<String>, metadata: Metadata, duration: Duration) -> Self {
        Self {
            name: name.into(),
            success: true,
            error_message: None,
            metadata,
            duration,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            success: false,
            error_message: Some(error.into()),
            metadata: Metadata::new(),
            duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_duration_ms")]
    pub total_duration: Duration,
}

impl BenchmarkSummary {
    pub fn from_results(results: &[BenchmarkResult]) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            total_duration: results.iter().map(|r| r.duration).sum(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub generated_at_unix_ms: u128,
    pub model: String,
    pub summary: BenchmarkSummary,
    pub results: Vec<BenchmarkResult>,
}

fn metadata<const N: usize>(entries: [(&str, Value); N]) -> Metadata {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn preview(text: &str) -> String {
    truncate_cell(text.trim(), 80)
}

async fn measure<Fut>(name: &str, telemetry: &TelemetrySink, body: Fut) -> BenchmarkResult
where
    Fut: Future<Output = Result<Metadata>>,
{
    tracing::info!(benchmark = %name, "benchmark started");
    let started = Instant::now();
    let outcome = body.await;
    let duration = started.elapsed();

    let result = match outcome {
        Ok(metadata) => BenchmarkResult::passed(name, metadata, duration),
        Err(err) => BenchmarkResult::failed(name, redacted_error_chain(&err), duration),
    };

    if result.success {
        tracing::info!(
            benchmark = %name,
            duration_ms = duration.as_millis() as u64,
            "benchmark passed"
        );
        telemetry.emit(
            "benchmark.passed",
            json!({ "benchmark": name, "duration_ms": duration.as_millis() }),
        );
    } else {
        let error = result.error_message.clone().unwrap_or_default();
        tracing::warn!(benchmark = %name, error = %error, "benchmark failed");
        telemetry.emit(
            "benchmark.failed",
            json!({ "benchmark": name, "duration_ms": duration.as_millis(), "error": error }),
        );
    }
    result
}

pub async fn simple_agent(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::SimpleAgent.label(), &ctx.telemetry, async {
        let agent = agents::simple_agent(ctx.model.clone())?;
        let text = run_to_text(ctx.runtime.as_ref(), &agent, SIMPLE_PROMPT, ctx.run_timeout).await?;
        if text.trim().is_empty() {
            return Err(anyhow::anyhow!("agent returned an empty response"));
        }
        anyhow::Ok(metadata([
            ("response_chars", json!(text.chars().count())),
            ("response", json!(preview(&text))),
        ]))
    })
    .await
}

pub async fn tool_integration(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::ToolIntegration.label(), &ctx.telemetry, async {
        let agent = agents::tool_agent(ctx.model.clone())?;
        let outcome = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            TOOL_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await?;
        if !outcome.called(tools::LOOKUP_COMPANY_TOOL_NAME) {
            return Err(anyhow::anyhow!(
                "agent never called {}",
                tools::LOOKUP_COMPANY_TOOL_NAME
            ));
        }
        let company = tools::CompanyLookupTool::COMPANY_NAME;
        if !outcome.text.contains(company) {
            return Err(anyhow::anyhow!("response does not contain '{company}'"));
        }
        anyhow::Ok(metadata([
            ("tool_calls", json!(outcome.tool_names())),
            ("response", json!(preview(&outcome.text))),
        ]))
    })
    .await
}

pub async fn team_coordination(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::TeamCoordination.label(), &ctx.telemetry, async {
        let agent = agents::team_agent(ctx.model.clone())?;
        let outcome = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            TEAM_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await?;
        for specialist in TEAM_SPECIALISTS {
            if !outcome.called(specialist) {
                return Err(anyhow::anyhow!(
                    "specialist '{specialist}' was never consulted"
                ));
            }
        }
        if outcome.text.trim().is_empty() {
            return Err(anyhow::anyhow!("coordinator returned an empty response"));
        }
        anyhow::Ok(metadata([
            ("delegations", json!(outcome.tool_names())),
            ("response_chars", json!(outcome.text.chars().count())),
        ]))
    })
    .await
}

pub async fn multi_agent_chain(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::MultiAgentChain.label(), &ctx.telemetry, async {
        let agent = agents::chain_agent(ctx.model.clone())?;
        let outcome = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            CHAIN_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await?;
        ensure_in_order(&outcome.text, &CHAIN_EXPERTS)?;
        anyhow::Ok(metadata([
            ("call_order", json!(outcome.tool_names())),
            ("response", json!(preview(&outcome.text))),
        ]))
    })
    .await
}

pub async fn concurrent_runs(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::ConcurrentRuns.label(), &ctx.telemetry, async {
        let agent = agents::simple_agent(ctx.model.clone())?;
        let mut runs = Vec::with_capacity(ctx.concurrent_runs);
        for idx in 0..ctx.concurrent_runs {
            let prompt = format!("What is {idx} plus {idx}?");
            runs.push(ctx.runtime.start(&agent, &prompt).await?);
        }

        let mut total_chars = 0usize;
        for (idx, mut run) in runs.into_iter().enumerate() {
            let run_id = run.id().to_string();
            let outcome = tokio::time::timeout(ctx.run_timeout, drain_run(&mut run, &ctx.telemetry))
                .await
                .with_context(|| {
                    format!(
                        "run '{}' timed out after {}ms",
                        run_id,
                        ctx.run_timeout.as_millis()
                    )
                })?
                .with_context(|| format!("concurrent run {idx} failed"))?;
            if outcome.text.trim().is_empty() {
                return Err(anyhow::anyhow!("concurrent run {idx} produced no text"));
            }
            total_chars += outcome.text.chars().count();
        }
        anyhow::Ok(metadata([
            ("runs", json!(ctx.concurrent_runs)),
            ("total_response_chars", json!(total_chars)),
        ]))
    })
    .await
}

pub async fn streaming(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::Streaming.label(), &ctx.telemetry, async {
        let agent = agents::streaming_agent(ctx.model.clone())?;
        let outcome = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            STREAMING_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await?;
        if !contains_ignore_case(&outcome.text, "paris") {
            return Err(anyhow::anyhow!("response does not mention 'Paris'"));
        }
        if outcome.chunks < 2 {
            return Err(anyhow::anyhow!(
                "expected at least 2 content chunks, got {}",
                outcome.chunks
            ));
        }
        anyhow::Ok(metadata([
            ("chunks", json!(outcome.chunks)),
            ("response", json!(preview(&outcome.text))),
        ]))
    })
    .await
}

pub async fn streaming_with_tools(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::StreamingWithTools.label(), &ctx.telemetry, async {
        let agent = agents::streaming_tool_agent(ctx.model.clone())?;
        let outcome = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            STREAMING_TOOL_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await?;
        let company = tools::CompanyLookupTool::COMPANY_NAME;
        if !outcome.text.contains(company) {
            return Err(anyhow::anyhow!("response does not contain '{company}'"));
        }
        if outcome.chunks < 2 {
            return Err(anyhow::anyhow!(
                "expected at least 2 content chunks, got {}",
                outcome.chunks
            ));
        }
        anyhow::Ok(metadata([
            ("chunks", json!(outcome.chunks)),
            ("tool_calls", json!(outcome.tool_names())),
        ]))
    })
    .await
}

pub async fn memory_persistence(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::MemoryPersistence.label(), &ctx.telemetry, async {
        let memory = Memory::new();
        let agent = agents::memory_agent(ctx.model.clone(), memory.clone())?;

        start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            MEMORY_SAVE_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await
        .context("first memory run failed")?;
        if memory.is_empty() {
            return Err(anyhow::anyhow!("first run did not save anything to memory"));
        }

        let recall = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            MEMORY_RECALL_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await
        .context("second memory run failed")?;
        if !contains_ignore_case(&recall.text, "blue") {
            return Err(anyhow::anyhow!(
                "second run did not recall the saved colour"
            ));
        }
        anyhow::Ok(metadata([
            ("saved_entries", json!(memory.entries().len())),
            ("response", json!(preview(&recall.text))),
        ]))
    })
    .await
}

pub async fn approval_flow(ctx: &BenchContext) -> BenchmarkResult {
    measure(BenchmarkName::ApprovalFlow.label(), &ctx.telemetry, async {
        let agent = agents::approval_agent(ctx.model.clone())?;
        let outcome = start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            APPROVAL_PROMPT,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await?;
        if outcome.approvals.is_empty() {
            return Err(anyhow::anyhow!("no approval request was observed"));
        }
        if !outcome.called(tools::SEND_NOTIFICATION_TOOL_NAME) {
            return Err(anyhow::anyhow!(
                "{} did not complete after approval",
                tools::SEND_NOTIFICATION_TOOL_NAME
            ));
        }
        anyhow::Ok(metadata([
            ("approvals", json!(outcome.approvals)),
            ("response", json!(preview(&outcome.text))),
        ]))
    })
    .await
}

pub async fn run_benchmark(ctx: &BenchContext, name: BenchmarkName) -> BenchmarkResult {
    match name {
        BenchmarkName::SimpleAgent => simple_agent(ctx).await,
        BenchmarkName::ToolIntegration => tool_integration(ctx).await,
        BenchmarkName::TeamCoordination => team_coordination(ctx).await,
        BenchmarkName::MultiAgentChain => multi_agent_chain(ctx).await,
        BenchmarkName::ConcurrentRuns => concurrent_runs(ctx).await,
        BenchmarkName::Streaming => streaming(ctx).await,
        BenchmarkName::StreamingWithTools => streaming_with_tools(ctx).await,
        BenchmarkName::MemoryPersistence => memory_persistence(ctx).await,
        BenchmarkName::ApprovalFlow => approval_flow(ctx).await,
    }
}

/// Scenarios to run, in declaration order; an empty filter selects all.
pub fn select_benchmarks(filter: &[BenchmarkName]) -> Vec<BenchmarkName> {
    BenchmarkName::ALL
        .into_iter()
        .filter(|name| filter.is_empty() || filter.contains(name))
        .collect()
}

pub async fn run_benchmarks(ctx: &BenchContext, filter: &[BenchmarkName]) -> Vec<BenchmarkResult> {
    let mut results = Vec::new();
    for name in select_benchmarks(filter) {
        results.push(run_benchmark(ctx, name).await);
    }
    results
}

fn format_duration(duration: Duration) -> String {
    format!("{:.1}ms", duration.as_secs_f64() * 1000.0)
}

fn details(result: &BenchmarkResult) -> String {
    if let Some(error) = result.error_message.as_ref() {
        return error.clone();
    }
    result
        .metadata
        .iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<String>>()
        .join(", ")
}

pub fn format_benchmark_table(results: &[BenchmarkResult]) -> String {
    let columns = [
        Column::left("Benchmark", 22),
        Column::left("Status", 6),
        Column::right("Duration", 11),
        Column::left("Details", 60),
    ];
    let rows = results
        .iter()
        .map(|result| {
            vec![
                result.name.clone(),
                if result.success { "PASS" } else { "FAIL" }.to_string(),
                format_duration(result.duration),
                details(result),
            ]
        })
        .collect::<Vec<Vec<String>>>();

    let summary = BenchmarkSummary::from_results(results);
    let mut out = render_table(&columns, &rows);
    out.push_str(&format!(
        "\nPassed {}/{} (failed={}) in {}\n",
        summary.passed,
        summary.total,
        summary.failed,
        format_duration(summary.total_duration)
    ));
    out
}

pub fn write_benchmark_report(path: &str, report: &BenchmarkReport) -> Result<()> {
    let path_buf = PathBuf::from(path);
    if let Some(parent) = path_buf.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create benchmark report directory '{}'",
                parent.display()
            )
        })?;
    }

    let payload = serde_json::to_string_pretty(report)
        .context("failed to serialize benchmark report to json")?;
    std::fs::write(&path_buf, payload)
        .with_context(|| format!("failed to write benchmark report to '{}'", path_buf.display()))
}

pub async fn run_bench(
    ctx: &BenchContext,
    filter: &[BenchmarkName],
    output_path: Option<String>,
) -> Result<BenchmarkSummary> {
    let results = run_benchmarks(ctx, filter).await;
    let summary = BenchmarkSummary::from_results(&results);

    println!("Benchmarks ({})", ctx.model_label());
    print!("{}", format_benchmark_table(&results));

    let output_path = output_path.unwrap_or_else(|| DEFAULT_BENCH_OUTPUT_PATH.to_string());
    let report = BenchmarkReport {
        generated_at_unix_ms: unix_ms_now(),
        model: ctx.model_label(),
        summary,
        results,
    };
    write_benchmark_report(&output_path, &report)?;
    println!("Report written to {}", output_path);

    ctx.telemetry.emit(
        "bench.completed",
        json!({
            "total": summary.total,
            "passed": summary.passed,
            "failed": summary.failed,
            "output_path": output_path
        }),
    );

    if !summary.all_passed() {
        return Err(anyhow::anyhow!(
            "{} of {} benchmarks failed",
            summary.failed,
            summary.total
        ));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, success: bool, ms: u64) -> BenchmarkResult {
        if success {
            BenchmarkResult::passed(
                name,
                metadata([("chunks", json!(3))]),
                Duration::from_millis(ms),
            )
        } else {
            BenchmarkResult::failed(name, "response does not contain 'Nexxia'", Duration::from_millis(ms))
        }
    }

    #[test]
    fn summary_counts_and_sums_durations() {
        let results = vec![
            result("simple_agent", true, 10),
            result("tool_integration", false, 5),
        ];
        let summary = BenchmarkSummary::from_results(&results);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_duration, Duration::from_millis(15));
        assert!(!summary.all_passed());
    }

    #[test]
    fn table_shows_status_and_details() {
        let table = format_benchmark_table(&[
            result("simple_agent", true, 10),
            result("tool_integration", false, 5),
        ]);
        let lines = table.lines().collect::<Vec<&str>>();
        assert!(lines[0].starts_with("Benchmark"));
        assert!(lines[2].contains("PASS") && lines[2].contains("chunks=3"));
        assert!(lines[3].contains("FAIL") && lines[3].contains("Nexxia"));
        assert!(table.contains("Passed 1/2 (failed=1)"));
    }

    #[test]
    fn filter_keeps_declaration_order() {
        let selected = select_benchmarks(&[BenchmarkName::ApprovalFlow, BenchmarkName::SimpleAgent]);
        assert_eq!(
            selected,
            vec![BenchmarkName::SimpleAgent, BenchmarkName::ApprovalFlow]
        );
        assert_eq!(select_benchmarks(&[]).len(), BenchmarkName::ALL.len());
    }

    #[test]
    fn report_serializes_duration_in_millis() {
        let value = serde_json::to_value(result("streaming", true, 12)).expect("serialize");
        assert_eq!(value["duration_ms"], json!(12.0));
        assert_eq!(value["success"], json!(true));
        assert!(value["error_message"].is_null());
    }
}
