use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;

use aigentic_bench::benchmark::{BenchContext, run_bench};
use aigentic_bench::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use aigentic_bench::config::{ProfilesFile, RuntimeConfig, load_profiles, resolve_runtime_config};
use aigentic_bench::driver::run_example;
use aigentic_bench::error::{categorize_error, format_cli_error, redacted_error_chain};
use aigentic_bench::eval::run_eval;
use aigentic_bench::profiles::{run_profiles_list, run_profiles_show};
use aigentic_bench::telemetry::{TelemetrySink, run_telemetry_report};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(
            category = %categorize_error(&err).code(),
            error = %redacted_error_chain(&err),
            "command failed"
        );
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));
    telemetry.emit("command.started", json!({ "profile": cfg.profile }));
    let started = Instant::now();

    let outcome = dispatch(cli.command, &cfg, &profiles, &telemetry).await;

    let duration_ms = started.elapsed().as_millis();
    match &outcome {
        Ok(()) => telemetry.emit("command.completed", json!({ "duration_ms": duration_ms })),
        Err(err) => telemetry.emit_command_failed(err, duration_ms),
    }
    outcome
}

async fn dispatch(
    command: Commands,
    cfg: &RuntimeConfig,
    profiles: &ProfilesFile,
    telemetry: &TelemetrySink,
) -> Result<()> {
    match command {
        Commands::Bench { only, output } => {
            let ctx = BenchContext::from_config(cfg, telemetry.clone())?;
            run_bench(&ctx, &only, output).await.map(|_| ())
        }
        Commands::Eval {
            dataset,
            iterations,
            output,
            fail_under,
        } => {
            let ctx = BenchContext::from_config(cfg, telemetry.clone())?;
            let iterations = iterations.unwrap_or(cfg.eval_iterations);
            run_eval(&ctx, dataset, output, iterations, fail_under)
                .await
                .map(|_| ())
        }
        Commands::Example { kind, prompt } => {
            let ctx = BenchContext::from_config(cfg, telemetry.clone())?;
            let prompt = (!prompt.is_empty()).then(|| prompt.join(" "));
            let outcome = run_example(
                ctx.runtime.as_ref(),
                ctx.model.clone(),
                kind,
                prompt,
                ctx.run_timeout,
                telemetry,
            )
            .await?;
            tracing::info!(
                run_id = %outcome.run_id,
                chunks = outcome.chunks,
                tools = outcome.tool_calls.len(),
                approvals = outcome.approvals.len(),
                "example finished"
            );
            Ok(())
        }
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(profiles, cfg),
            ProfileCommands::Show => run_profiles_show(cfg),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(cfg, path, limit),
        },
    }
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
