use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde_json::{Value, json};
use tempfile::tempdir;

use crate::agents::{self, CHAIN_EXPERTS, tools};
use crate::benchmark::*;
use crate::checks::*;
use crate::cli::*;
use crate::config::*;
use crate::driver::*;
use crate::eval::*;
use crate::framework::model::ToolCall;
use crate::framework::runtime::{LocalRuntime, RuntimeOptions};
use crate::framework::*;
use crate::telemetry::*;

struct FailingModel;

#[async_trait]
impl Model for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _request: &ModelRequest) -> anyhow::Result<ModelResponse> {
        Err(anyhow::anyhow!("upstream unavailable"))
    }
}

struct SlowModel;

#[async_trait]
impl Model for SlowModel {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _request: &ModelRequest) -> anyhow::Result<ModelResponse> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ModelResponse::Text("too late".to_string()))
    }
}

fn simulated() -> Arc<dyn Model> {
    Arc::new(SimulatedModel::new())
}

fn text_model(text: &str) -> Arc<dyn Model> {
    let text = text.to_string();
    ScriptedModel::new("mock")
        .with_fallback(move |_| ModelResponse::Text(text.clone()))
        .into_arc()
}

/// Coordinator forwards each expert's reply to the next expert in `order`;
/// every expert appends its own name.
fn chain_model(order: [&'static str; 3]) -> Arc<dyn Model> {
    ScriptedModel::new("chain-mock")
        .with_fallback(move |req| {
            if req.agent != "chain_coordinator" {
                return ModelResponse::Text(format!("{} {}", req.prompt(), req.agent));
            }
            let done = req.tool_results();
            let last = done
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_else(|| req.prompt().to_string());
            match order.get(done.len()) {
                Some(next) => ModelResponse::ToolCalls(vec![ToolCall {
                    id: format!("call-{}", done.len()),
                    name: next.to_string(),
                    args: json!({ "input": last }),
                }]),
                None => ModelResponse::Text(last),
            }
        })
        .into_arc()
}

fn test_runtime() -> Arc<dyn AgentRuntime> {
    Arc::new(LocalRuntime::new(Session::with_id("test-session")))
}

fn test_ctx(model: Arc<dyn Model>) -> BenchContext {
    BenchContext::new(test_runtime(), model, TelemetrySink::disabled("test"))
        .with_run_timeout(Duration::from_secs(5))
}

fn test_cli(config_path: &str, profile: &str) -> Cli {
    Cli {
        provider: Provider::Auto,
        model: None,
        profile: profile.to_string(),
        config_path: config_path.to_string(),
        session_id: None,
        run_timeout_secs: None,
        max_turns: None,
        chunk_words: None,
        concurrent_runs: None,
        telemetry_enabled: None,
        telemetry_path: None,
        trace_path: None,
        log_filter: "warn".to_string(),
        command: Commands::Profiles {
            command: ProfileCommands::Show,
        },
    }
}

#[tokio::test]
async fn chain_benchmark_passes_when_experts_run_in_order() {
    let ctx = test_ctx(chain_model(CHAIN_EXPERTS));
    let result = multi_agent_chain(&ctx).await;
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(
        result.metadata["call_order"],
        json!(["expert1", "expert2", "expert3"])
    );
}

#[tokio::test]
async fn chain_benchmark_reports_misordered_experts() {
    let ctx = test_ctx(chain_model(["expert2", "expert1", "expert3"]));
    let result = multi_agent_chain(&ctx).await;
    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("response mentions 'expert2' before 'expert1'")
    );
}

#[tokio::test]
async fn streaming_benchmark_requires_paris_and_multiple_chunks() {
    let ctx = test_ctx(text_model("The capital of France is Paris."));
    let result = streaming(&ctx).await;
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.metadata["chunks"], json!(2));

    let single = test_ctx(text_model("Paris"));
    let result = streaming(&single).await;
    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("expected at least 2 content chunks, got 1")
    );

    let wrong = test_ctx(text_model("The capital of France is Lyon."));
    let result = streaming(&wrong).await;
    assert!(!result.success);
    assert!(
        result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("Paris")
    );
}

/// Looks the company up once, then answers with `answer`.
fn company_model(answer: &str) -> Arc<dyn Model> {
    let answer = answer.to_string();
    ScriptedModel::new("company-mock")
        .with_fallback(move |req| {
            if req.tool_results().is_empty() {
                ModelResponse::ToolCalls(vec![ToolCall {
                    id: "lookup-1".to_string(),
                    name: tools::LOOKUP_COMPANY_TOOL_NAME.to_string(),
                    args: json!({ "company_id": "150" }),
                }])
            } else {
                ModelResponse::Text(answer.clone())
            }
        })
        .into_arc()
}

#[tokio::test]
async fn streaming_with_tools_requires_company_name_and_multiple_chunks() {
    let ctx = test_ctx(company_model("Company 150 is Nexxia."));
    let result = streaming_with_tools(&ctx).await;
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.metadata["chunks"], json!(2));
    assert_eq!(result.metadata["tool_calls"], json!(["lookup_company_name"]));

    let missing = test_ctx(company_model("Company 150 is not in the directory."));
    let result = streaming_with_tools(&missing).await;
    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("response does not contain 'Nexxia'")
    );

    let single = test_ctx(company_model("Nexxia"));
    let result = streaming_with_tools(&single).await;
    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("expected at least 2 content chunks, got 1")
    );

    // one chunk covers the whole answer
    let wide_runtime = LocalRuntime::new(Session::with_id("wide")).with_options(RuntimeOptions {
        chunk_words: 50,
        ..RuntimeOptions::default()
    });
    let wide = BenchContext::new(
        Arc::new(wide_runtime),
        company_model("Company 150 is Nexxia."),
        TelemetrySink::disabled("test"),
    )
    .with_run_timeout(Duration::from_secs(5));
    let result = streaming_with_tools(&wide).await;
    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("expected at least 2 content chunks, got 1")
    );
}

#[tokio::test]
async fn streamed_chunks_concatenate_to_the_full_answer() {
    let runtime = LocalRuntime::new(Session::with_id("chunks")).with_options(RuntimeOptions {
        chunk_words: 2,
        ..RuntimeOptions::default()
    });
    let answer = "one two three four five";
    let agent = agents::streaming_agent(text_model(answer)).expect("agent should build");
    let outcome = start_and_drain(
        &runtime,
        &agent,
        "count to five",
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect("run should drain");
    assert_eq!(outcome.text, answer);
    assert_eq!(outcome.chunks, 3);
}

#[tokio::test]
async fn simulated_model_passes_tool_scenarios() {
    let ctx = test_ctx(simulated()).with_concurrent_runs(4);
    for result in [
        simple_agent(&ctx).await,
        tool_integration(&ctx).await,
        team_coordination(&ctx).await,
        concurrent_runs(&ctx).await,
        streaming_with_tools(&ctx).await,
        memory_persistence(&ctx).await,
        approval_flow(&ctx).await,
    ] {
        assert!(result.success, "{}: {:?}", result.name, result.error_message);
    }
}

#[tokio::test]
async fn run_benchmarks_keeps_going_after_a_failure() {
    let ctx = test_ctx(simulated());
    let results = run_benchmarks(&ctx, &[]).await;
    let names = results
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        names,
        BenchmarkName::ALL
            .iter()
            .map(|name| name.label())
            .collect::<Vec<&str>>()
    );

    // the offline model echoes prompts, so it cannot name the capital
    let failed = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(failed, vec!["streaming"]);

    let summary = BenchmarkSummary::from_results(&results);
    assert_eq!(summary.passed, BenchmarkName::ALL.len() - 1);
}

#[tokio::test]
async fn approval_flow_auto_approves_and_records_tool_result() {
    let runtime = test_runtime();
    let agent = agents::approval_agent(simulated()).expect("agent should build");
    let outcome = start_and_drain(
        runtime.as_ref(),
        &agent,
        "Tell ops the build passed.",
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect("run should drain");
    assert_eq!(outcome.approvals, vec![tools::SEND_NOTIFICATION_TOOL_NAME]);
    assert!(outcome.called(tools::SEND_NOTIFICATION_TOOL_NAME));
    assert!(outcome.text.contains("\"status\":\"sent\""));
}

#[tokio::test]
async fn wait_denies_approval_requests() {
    let runtime = test_runtime();
    let agent = agents::approval_agent(simulated()).expect("agent should build");
    let text = run_to_text(
        runtime.as_ref(),
        &agent,
        "Tell ops the build passed.",
        Duration::from_secs(5),
    )
    .await
    .expect("run should finish");
    assert!(text.contains("tool call 'send_notification' denied"));
}

#[tokio::test]
async fn memory_is_shared_between_runs() {
    let runtime = test_runtime();
    let memory = Memory::new();
    let model = ScriptedModel::new("memory-mock")
        .with_tool_call(
            "save_memory",
            json!({ "key": "favourite_colour", "value": "blue" }),
        )
        .with_text("Saved.")
        .with_fallback(|req| {
            ModelResponse::Text(
                req.memory
                    .clone()
                    .unwrap_or_else(|| "I don't know.".to_string()),
            )
        })
        .into_arc();
    let agent = agents::memory_agent(model, memory.clone()).expect("agent should build");
    let telemetry = TelemetrySink::disabled("test");

    start_and_drain(
        runtime.as_ref(),
        &agent,
        "My favourite colour is blue.",
        Duration::from_secs(5),
        &telemetry,
    )
    .await
    .expect("first run should drain");
    assert_eq!(memory.get("favourite_colour").as_deref(), Some("blue"));

    let recall = start_and_drain(
        runtime.as_ref(),
        &agent,
        "What is my favourite colour?",
        Duration::from_secs(5),
        &telemetry,
    )
    .await
    .expect("second run should drain");
    assert!(recall.text.contains("favourite_colour: blue"));
}

#[tokio::test]
async fn error_events_fail_the_drain() {
    let runtime = test_runtime();
    let agent = agents::simple_agent(Arc::new(FailingModel)).expect("agent should build");
    let err = start_and_drain(
        runtime.as_ref(),
        &agent,
        "hello",
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect_err("run should fail");
    let message = format!("{err:#}");
    assert!(message.starts_with("agent run failed:"), "{message}");
    assert!(message.contains("upstream unavailable"), "{message}");
}

struct RejectedKeyModel;

#[async_trait]
impl Model for RejectedKeyModel {
    fn name(&self) -> &str {
        "rejected-key"
    }

    async fn generate(&self, _request: &ModelRequest) -> anyhow::Result<ModelResponse> {
        Err(anyhow::anyhow!(
            "chat completion returned 401: incorrect API key sk-abcdef1234567890"
        ))
    }
}

#[tokio::test]
async fn run_failures_mask_api_keys() {
    let trace = Trace::new();
    let runtime = LocalRuntime::new(Session::with_id("keys").with_trace(trace.clone()));
    let agent = agents::simple_agent(Arc::new(RejectedKeyModel)).expect("agent should build");
    let err = start_and_drain(
        &runtime,
        &agent,
        "hello",
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect_err("run should fail");
    let message = format!("{err:#}");
    assert!(message.contains("incorrect API key sk-[REDACTED]"), "{message}");
    assert!(!message.contains("abcdef1234567890"), "{message}");

    let failed = trace
        .entries()
        .into_iter()
        .find(|entry| entry.kind == "run.failed")
        .expect("failure should be traced");
    assert!(!failed.detail.to_string().contains("abcdef1234567890"));

    let result = simple_agent(&test_ctx(Arc::new(RejectedKeyModel))).await;
    assert!(!result.success);
    assert!(
        !result
            .error_message
            .unwrap_or_default()
            .contains("abcdef1234567890")
    );
}

#[tokio::test]
async fn runaway_tool_loops_stop_at_max_turns() {
    let runtime = LocalRuntime::new(Session::with_id("loops")).with_options(RuntimeOptions {
        max_turns: 2,
        ..RuntimeOptions::default()
    });
    let model = ScriptedModel::new("loop")
        .with_fallback(|_| {
            ModelResponse::ToolCalls(vec![ToolCall {
                id: "again".to_string(),
                name: tools::ADD_NUMBERS_TOOL_NAME.to_string(),
                args: json!({ "a": 1, "b": 1 }),
            }])
        })
        .into_arc();
    let agent = agents::tool_agent(model).expect("agent should build");
    let err = run_to_text(&runtime, &agent, "add forever", Duration::from_secs(5))
        .await
        .expect_err("run should fail");
    assert!(err.to_string().contains("exceeded 2 model turns"), "{err}");
}

#[tokio::test]
async fn wait_times_out_on_slow_models() {
    let runtime = test_runtime();
    let agent = agents::simple_agent(Arc::new(SlowModel)).expect("agent should build");
    let err = run_to_text(runtime.as_ref(), &agent, "hello", Duration::from_millis(50))
        .await
        .expect_err("run should time out");
    assert!(err.to_string().contains("timed out after 50ms"), "{err}");
}

#[tokio::test]
async fn empty_prompts_are_rejected_at_start() {
    let runtime = test_runtime();
    let agent = agents::simple_agent(simulated()).expect("agent should build");
    match runtime.start(&agent, "   ").await {
        Ok(_) => panic!("empty prompt should fail"),
        Err(err) => assert!(err.to_string().contains("empty prompt")),
    }
}

#[tokio::test]
async fn trace_records_each_run() {
    let trace = Trace::new();
    let runtime = LocalRuntime::new(Session::with_id("traced").with_trace(trace.clone()));
    let agent = agents::tool_agent(simulated()).expect("agent should build");
    let outcome = start_and_drain(
        &runtime,
        &agent,
        "Who is company 7?",
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect("run should drain");

    let kinds = trace
        .entries_for_run(&outcome.run_id)
        .into_iter()
        .map(|entry| entry.kind)
        .collect::<Vec<String>>();
    assert_eq!(kinds.first().map(String::as_str), Some("run.started"));
    assert_eq!(kinds.last().map(String::as_str), Some("run.completed"));
    assert_eq!(
        kinds.iter().filter(|kind| *kind == "tool.completed").count(),
        2
    );
}

#[tokio::test]
async fn trace_marks_evaluation_runs() {
    let trace = Trace::new();
    let runtime = LocalRuntime::new(Session::with_id("eval-trace").with_trace(trace.clone()));
    let agent = agents::eval_agent(text_model("Paris."), "concise", "Answer briefly.")
        .expect("agent should build");
    let outcome = start_and_drain(
        &runtime,
        &agent,
        DEFAULT_EVAL_PROMPT,
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect("run should drain");

    let started = trace
        .entries_for_run(&outcome.run_id)
        .into_iter()
        .find(|entry| entry.kind == "run.started")
        .expect("start should be traced");
    assert_eq!(started.detail["evaluation"], json!(true));
    assert_eq!(started.detail["stream"], json!(false));

    let plain = agents::simple_agent(text_model("hi")).expect("agent should build");
    let outcome = start_and_drain(
        &runtime,
        &plain,
        "hello",
        Duration::from_secs(5),
        &TelemetrySink::disabled("test"),
    )
    .await
    .expect("run should drain");
    let started = trace
        .entries_for_run(&outcome.run_id)
        .into_iter()
        .find(|entry| entry.kind == "run.started")
        .expect("start should be traced");
    assert_eq!(started.detail["evaluation"], json!(false));
}

#[tokio::test]
async fn tool_events_reach_the_telemetry_file() {
    let dir = tempdir().expect("tempdir should be created");
    let mut telemetry = TelemetrySink::disabled("bench");
    telemetry.enabled = true;
    telemetry.path = dir.path().join("events.jsonl");

    let runtime = test_runtime();
    let agent = agents::approval_agent(simulated()).expect("agent should build");
    start_and_drain(
        runtime.as_ref(),
        &agent,
        "Ping on-call.",
        Duration::from_secs(5),
        &telemetry,
    )
    .await
    .expect("run should drain");

    let lines = std::fs::read_to_string(&telemetry.path)
        .expect("telemetry should exist")
        .lines()
        .map(str::to_string)
        .collect::<Vec<String>>();
    let events = lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|event| event["event"].as_str().map(str::to_string))
        .collect::<Vec<String>>();
    assert_eq!(
        events,
        vec![
            "approval.requested",
            "approval.granted",
            "tool.requested",
            "tool.succeeded"
        ]
    );

    let summary = summarize_telemetry_lines(lines, 100);
    assert_eq!(summary.count("tool.succeeded"), 1);
    assert_eq!(summary.count("approval.granted"), 1);
}

fn variant_model() -> Arc<dyn Model> {
    ScriptedModel::new("eval-mock")
        .with_fallback(|req| {
            let text = match req.agent.as_str() {
                "eval_concise" => "Paris, France.",
                "eval_detailed" => "Lyon",
                _ => "The capital of France is Paris.",
            };
            ModelResponse::Text(text.to_string())
        })
        .into_arc()
}

#[tokio::test]
async fn eval_suite_ranks_variants_by_average_score() {
    let ctx = test_ctx(variant_model());
    let results = run_eval_suite(&ctx, &default_dataset(), 2)
        .await
        .expect("suite should run");
    let order = results
        .iter()
        .map(|r| r.variant.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(order, vec!["concise", "step_by_step", "detailed"]);

    let detailed = &results[2];
    assert!((detailed.avg_score - 0.4).abs() < 1e-9);
    assert_eq!(detailed.pass_rate, 0.0);
    assert_eq!(detailed.accuracy_score, 0.0);
    assert!(detailed.failed_checks.contains(&"min_length".to_string()));

    let table = format_eval_table(&results);
    let first_row = table.lines().nth(2).unwrap_or_default();
    assert!(first_row.contains("concise") && first_row.contains("1.00"));
}

#[tokio::test]
async fn eval_run_errors_score_zero() {
    let ctx = test_ctx(Arc::new(FailingModel));
    let variant = PromptVariant {
        name: "concise".to_string(),
        instructions: "Answer briefly.".to_string(),
    };
    let result = run_eval_variant(&ctx, DEFAULT_EVAL_PROMPT, &variant, &default_dataset().checks, 3)
        .await
        .expect("variant should be scored");
    assert_eq!(result.error_count, 3);
    assert_eq!(result.avg_score, 0.0);
    assert_eq!(result.pass_rate, 0.0);
    assert!(result.content.is_empty());
}

#[tokio::test]
async fn eval_writes_report_and_enforces_threshold() {
    let dir = tempdir().expect("tempdir should be created");
    let output = dir.path().join("eval.json");
    let ctx = test_ctx(variant_model());

    let results = run_eval(
        &ctx,
        None,
        Some(output.to_string_lossy().to_string()),
        1,
        Some(0.9),
    )
    .await
    .expect("best variant clears threshold");
    assert_eq!(results.len(), 3);

    let report: Value = serde_json::from_str(
        &std::fs::read_to_string(&output).expect("report should be written"),
    )
    .expect("report should be json");
    assert_eq!(report["dataset_name"], "capital-baseline");
    assert_eq!(report["results"][0]["variant"], "concise");

    let failing = test_ctx(text_model("Lyon"));
    let err = run_eval(
        &failing,
        None,
        Some(output.to_string_lossy().to_string()),
        1,
        Some(0.9),
    )
    .await
    .expect_err("threshold should fail");
    assert!(err.to_string().contains("below threshold"));
}

#[tokio::test]
async fn bench_command_writes_report_and_fails_on_failures() {
    let dir = tempdir().expect("tempdir should be created");
    let output = dir.path().join("bench.json");
    let ctx = test_ctx(simulated());

    let summary = run_bench(
        &ctx,
        &[BenchmarkName::ToolIntegration, BenchmarkName::ApprovalFlow],
        Some(output.to_string_lossy().to_string()),
    )
    .await
    .expect("selected benchmarks pass");
    assert_eq!(summary.passed, 2);

    let report: Value = serde_json::from_str(
        &std::fs::read_to_string(&output).expect("report should be written"),
    )
    .expect("report should be json");
    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["results"][1]["name"], "approval_flow");

    let err = run_bench(
        &ctx,
        &[BenchmarkName::Streaming],
        Some(output.to_string_lossy().to_string()),
    )
    .await
    .expect_err("streaming fails offline");
    assert_eq!(err.to_string(), "1 of 1 benchmarks failed");
}

#[test]
fn cli_parses_bench_filters_and_globals() {
    let cli = Cli::try_parse_from([
        "aigentic-bench",
        "--provider",
        "simulated",
        "--chunk-words",
        "4",
        "bench",
        "--only",
        "multi-agent-chain",
        "--only",
        "streaming",
    ])
    .expect("cli should parse");
    assert_eq!(cli.provider, Provider::Simulated);
    assert_eq!(cli.chunk_words, Some(4));
    let Commands::Bench { only, output } = &cli.command else {
        panic!("expected bench command");
    };
    assert_eq!(
        only,
        &vec![BenchmarkName::MultiAgentChain, BenchmarkName::Streaming]
    );
    assert!(output.is_none());
    assert_eq!(command_label(&cli.command), "bench");

    let example = Cli::try_parse_from(["aigentic-bench", "example", "streaming-tools", "hi", "there"])
        .expect("example should parse");
    assert_eq!(command_label(&example.command), "example.streaming-tools");
}

#[test]
fn profile_values_apply_below_cli_overrides() {
    let dir = tempdir().expect("tempdir should be created");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[profiles.ci]
provider = "simulated"
model = "offline"
run_timeout_secs = 5
chunk_words = 2
concurrent_runs = 6
eval_iterations = 4
telemetry_enabled = false
trace_path = "trace.jsonl"
"#,
    )
    .expect("config should be written");
    let config_path = path.to_string_lossy().to_string();
    let profiles = load_profiles(&config_path).expect("profiles should load");

    let mut cli = test_cli(&config_path, "ci");
    cli.chunk_words = Some(5);
    let cfg = resolve_runtime_config(&cli, &profiles).expect("config should resolve");
    assert_eq!(cfg.provider, Provider::Simulated);
    assert_eq!(cfg.model.as_deref(), Some("offline"));
    assert_eq!(cfg.run_timeout_secs, 5);
    assert_eq!(cfg.chunk_words, 5);
    assert_eq!(cfg.concurrent_runs, 6);
    assert_eq!(cfg.eval_iterations, 4);
    assert!(!cfg.telemetry_enabled);
    assert_eq!(cfg.trace_path.as_deref(), Some("trace.jsonl"));
    assert_eq!(cfg.max_turns, crate::framework::runtime::DEFAULT_MAX_TURNS);

    let default_cfg = resolve_runtime_config(&test_cli(&config_path, "default"), &profiles)
        .expect("implicit default should resolve");
    assert_eq!(default_cfg.provider, Provider::Auto);
    assert_eq!(default_cfg.run_timeout_secs, DEFAULT_RUN_TIMEOUT_SECS);

    let err = resolve_runtime_config(&test_cli(&config_path, "nightly"), &profiles)
        .expect_err("unknown profile should fail");
    assert!(err.to_string().contains("Available profiles: ci"));
}

#[test]
fn unknown_profile_fields_are_rejected() {
    let dir = tempdir().expect("tempdir should be created");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.ci]\nretrieval_backend = \"local\"\n")
        .expect("config should be written");
    let err = load_profiles(&path.to_string_lossy()).expect_err("unknown field should fail");
    assert!(format!("{err:#}").contains("invalid profile configuration"));
}

#[test]
fn simulated_provider_builds_without_credentials() {
    let mut cfg = resolve_runtime_config(&test_cli("missing.toml", "default"), &Default::default())
        .expect("config should resolve");
    cfg.provider = Provider::Simulated;
    let ctx = BenchContext::from_config(&cfg, TelemetrySink::disabled("test"))
        .expect("simulated context should build");
    assert_eq!(ctx.model.name(), "simulated");
    assert_eq!(ctx.model_label(), "simulated/simulated");
    assert_eq!(ctx.run_timeout, Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS));
}

#[test]
fn ordered_check_matches_benchmark_assertion() {
    let text = "begin expert1 expert2 expert3";
    assert!(ensure_in_order(text, &CHAIN_EXPERTS).is_ok());
    let check = EvalCheck::new(
        "expert_order",
        CheckKind::InOrder {
            values: CHAIN_EXPERTS.iter().map(|s| s.to_string()).collect(),
        },
    );
    assert!(check.passes(text));
    assert!(check.is_relevance());
    assert!(!check.passes("begin expert3 expert2 expert1"));
}
