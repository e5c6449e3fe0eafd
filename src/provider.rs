use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::Provider;
use crate::config::RuntimeConfig;
use crate::framework::openai::{
    DEFAULT_OLLAMA_BASE_URL, DEFAULT_OPENAI_BASE_URL, OpenAiConfig, OpenAiModel,
};
use crate::framework::{Model, SimulatedModel};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

pub fn validate_model_for_provider(provider: Provider, model_name: &str) -> Result<()> {
    let is_valid = match provider {
        Provider::Openai => {
            model_name.starts_with("gpt-")
                || model_name.starts_with("o1")
                || model_name.starts_with("o3")
                || model_name.starts_with("o4")
        }
        Provider::Ollama => !model_name.trim().is_empty(),
        Provider::Simulated | Provider::Auto => true,
    };

    if is_valid {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "model '{}' is not compatible with provider '{:?}'",
        model_name,
        provider
    ))
}

/// Concrete provider for `auto`: openai with a key, ollama with a host,
/// otherwise the offline simulated model.
pub fn detect_provider() -> Provider {
    if env_present("OPENAI_API_KEY") {
        return Provider::Openai;
    }
    if env_present("OLLAMA_HOST") {
        return Provider::Ollama;
    }
    Provider::Simulated
}

pub fn resolve_model(cfg: &RuntimeConfig) -> Result<(Arc<dyn Model>, Provider, String)> {
    let provider = match cfg.provider {
        Provider::Auto => detect_provider(),
        p => p,
    };
    let timeout = Duration::from_secs(cfg.run_timeout_secs);

    match provider {
        Provider::Simulated => {
            let model = SimulatedModel::new();
            let model_name = model.name().to_string();
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Openai => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY is required for OpenAI provider")?;
            let model_name = cfg
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            validate_model_for_provider(provider, &model_name)?;
            let base_url = cfg
                .base_url
                .clone()
                .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
            let model = OpenAiModel::new(
                OpenAiConfig::new(Some(api_key), model_name.clone())
                    .with_base_url(base_url)
                    .with_timeout(timeout),
            )?;
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Ollama => {
            let base_url = cfg
                .base_url
                .clone()
                .or_else(|| {
                    std::env::var("OLLAMA_HOST")
                        .ok()
                        .filter(|host| !host.trim().is_empty())
                        .map(|host| format!("{}/v1", host.trim_end_matches('/')))
                })
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
            let model_name = cfg
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
            validate_model_for_provider(provider, &model_name)?;
            let model = OpenAiModel::new(
                OpenAiConfig::new(None, model_name.clone())
                    .with_base_url(base_url)
                    .with_timeout(timeout),
            )?;
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Auto => Err(anyhow::anyhow!(
            "auto provider must be resolved before building a model"
        )),
    }
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}
