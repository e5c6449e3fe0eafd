use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;
use crate::framework::runtime::{DEFAULT_CHUNK_WORDS, DEFAULT_MAX_TURNS, RuntimeOptions};

pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONCURRENT_RUNS: usize = 3;
pub const DEFAULT_EVAL_ITERATIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub session_id: String,
    pub run_timeout_secs: u64,
    pub max_turns: usize,
    pub chunk_words: usize,
    pub concurrent_runs: usize,
    pub eval_iterations: usize,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
    pub trace_path: Option<String>,
}

impl RuntimeConfig {
    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            max_turns: self.max_turns,
            chunk_words: self.chunk_words,
            ..RuntimeOptions::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub session_id: Option<String>,
    pub run_timeout_secs: Option<u64>,
    pub max_turns: Option<usize>,
    pub chunk_words: Option<usize>,
    pub concurrent_runs: Option<usize>,
    pub eval_iterations: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
    pub trace_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check provider values and field names.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        provider,
        model: cli.model.clone().or(profile.model),
        base_url: profile.base_url,
        session_id: cli
            .session_id
            .clone()
            .or(profile.session_id)
            .unwrap_or_else(|| "bench-session".to_string()),
        run_timeout_secs: cli
            .run_timeout_secs
            .or(profile.run_timeout_secs)
            .unwrap_or(DEFAULT_RUN_TIMEOUT_SECS)
            .max(1),
        max_turns: cli
            .max_turns
            .or(profile.max_turns)
            .unwrap_or(DEFAULT_MAX_TURNS)
            .max(1),
        chunk_words: cli
            .chunk_words
            .or(profile.chunk_words)
            .unwrap_or(DEFAULT_CHUNK_WORDS)
            .max(1),
        concurrent_runs: cli
            .concurrent_runs
            .or(profile.concurrent_runs)
            .unwrap_or(DEFAULT_CONCURRENT_RUNS)
            .max(1),
        eval_iterations: profile
            .eval_iterations
            .unwrap_or(DEFAULT_EVAL_ITERATIONS)
            .max(1),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".aigentic-bench/telemetry/events.jsonl".to_string()),
        trace_path: cli.trace_path.clone().or(profile.trace_path),
    })
}
