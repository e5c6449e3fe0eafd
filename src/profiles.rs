use anyhow::Result;

use crate::cli::Provider;
use crate::config::{ProfilesFile, RuntimeConfig};
use crate::provider::detect_provider;

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    if cfg.provider == Provider::Auto {
        println!("Provider: Auto (resolves to {:?})", detect_provider());
    } else {
        println!("Provider: {:?}", cfg.provider);
    }
    println!(
        "Model: {}",
        cfg.model.as_deref().unwrap_or("<provider-default>")
    );
    println!(
        "Base URL: {}",
        cfg.base_url.as_deref().unwrap_or("<provider-default>")
    );
    println!("Session ID: {}", cfg.session_id);
    println!("Run timeout (secs): {}", cfg.run_timeout_secs);
    println!("Max turns: {}", cfg.max_turns);
    println!("Chunk words: {}", cfg.chunk_words);
    println!("Concurrent runs: {}", cfg.concurrent_runs);
    println!("Eval iterations: {}", cfg.eval_iterations);
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    println!(
        "Trace path: {}",
        cfg.trace_path.as_deref().unwrap_or("<disabled>")
    );
    Ok(())
}
