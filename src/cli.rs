use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Simulated,
    Openai,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExampleKind {
    Simple,
    Tools,
    Team,
    Chain,
    Streaming,
    StreamingTools,
    Memory,
    Approval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BenchmarkName {
    SimpleAgent,
    ToolIntegration,
    TeamCoordination,
    MultiAgentChain,
    ConcurrentRuns,
    Streaming,
    StreamingWithTools,
    MemoryPersistence,
    ApprovalFlow,
}

impl BenchmarkName {
    pub const ALL: [BenchmarkName; 9] = [
        BenchmarkName::SimpleAgent,
        BenchmarkName::ToolIntegration,
        BenchmarkName::TeamCoordination,
        BenchmarkName::MultiAgentChain,
        BenchmarkName::ConcurrentRuns,
        BenchmarkName::Streaming,
        BenchmarkName::StreamingWithTools,
        BenchmarkName::MemoryPersistence,
        BenchmarkName::ApprovalFlow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BenchmarkName::SimpleAgent => "simple_agent",
            BenchmarkName::ToolIntegration => "tool_integration",
            BenchmarkName::TeamCoordination => "team_coordination",
            BenchmarkName::MultiAgentChain => "multi_agent_chain",
            BenchmarkName::ConcurrentRuns => "concurrent_runs",
            BenchmarkName::Streaming => "streaming",
            BenchmarkName::StreamingWithTools => "streaming_with_tools",
            BenchmarkName::MemoryPersistence => "memory_persistence",
            BenchmarkName::ApprovalFlow => "approval_flow",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  aigentic-bench bench\n\
  aigentic-bench bench --only multi-agent-chain --only streaming\n\
  aigentic-bench --provider openai --model gpt-4o-mini bench --output .aigentic-bench/bench.json\n\
  aigentic-bench eval --iterations 5\n\
  aigentic-bench eval --dataset evals/capital.json --output .aigentic-bench/eval.json\n\
  aigentic-bench example chain\n\
  aigentic-bench example streaming-tools \"Which company has id 42?\"\n\
  aigentic-bench telemetry report --limit 2000\n\
\n\
Provider selection:\n\
  - auto picks openai when OPENAI_API_KEY is set, ollama when OLLAMA_HOST is set,\n\
    and the offline simulated model otherwise.";

#[derive(Debug, Parser)]
#[command(name = "aigentic-bench")]
#[command(about = "Benchmark and example-running harness for multi-agent orchestration")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "AIGENTIC_BENCH_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "AIGENTIC_BENCH_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "AIGENTIC_BENCH_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(
        long,
        env = "AIGENTIC_BENCH_CONFIG",
        default_value = ".aigentic-bench/config.toml"
    )]
    pub config_path: String,

    #[arg(long, env = "AIGENTIC_BENCH_SESSION_ID")]
    pub session_id: Option<String>,

    #[arg(long, env = "AIGENTIC_BENCH_RUN_TIMEOUT_SECS")]
    pub run_timeout_secs: Option<u64>,

    #[arg(long, env = "AIGENTIC_BENCH_MAX_TURNS")]
    pub max_turns: Option<usize>,

    #[arg(long, env = "AIGENTIC_BENCH_CHUNK_WORDS")]
    pub chunk_words: Option<usize>,

    #[arg(long, env = "AIGENTIC_BENCH_CONCURRENT_RUNS")]
    pub concurrent_runs: Option<usize>,

    #[arg(long, env = "AIGENTIC_BENCH_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "AIGENTIC_BENCH_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "AIGENTIC_BENCH_TRACE_PATH")]
    pub trace_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run the benchmark scenarios and print a summary table")]
    Bench {
        #[arg(long, value_enum)]
        only: Vec<BenchmarkName>,
        #[arg(long)]
        output: Option<String>,
    },
    #[command(about = "Score prompt variants against string checks and rank them")]
    Eval {
        #[arg(long)]
        dataset: Option<String>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        fail_under: Option<f64>,
    },
    #[command(about = "Run one example agent and stream its events")]
    Example {
        #[arg(value_enum)]
        kind: ExampleKind,
        prompt: Vec<String>,
    },
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn example_kind_label(kind: ExampleKind) -> &'static str {
    match kind {
        ExampleKind::Simple => "simple",
        ExampleKind::Tools => "tools",
        ExampleKind::Team => "team",
        ExampleKind::Chain => "chain",
        ExampleKind::Streaming => "streaming",
        ExampleKind::StreamingTools => "streaming-tools",
        ExampleKind::Memory => "memory",
        ExampleKind::Approval => "approval",
    }
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Bench { .. } => "bench".to_string(),
        Commands::Eval { .. } => "eval".to_string(),
        Commands::Example { kind, .. } => format!("example.{}", example_kind_label(*kind)),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
