use actionloop_core::Config;
use tracing::debug;

use crate::{OpenAIProvider, Provider};

/// Default api_base for the OpenAI-compatible backends we know about.
fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// Infer the provider name from a model string prefix.
/// `None` means the prefix is not recognized.
pub fn infer_provider_from_model(model: &str) -> Option<&'static str> {
    if model.starts_with("openrouter/") {
        Some("openrouter")
    } else if model.starts_with("ollama/") {
        Some("ollama")
    } else if model.starts_with("deepseek") {
        Some("deepseek")
    } else if model.starts_with("openai/")
        || model.starts_with("gpt-")
        || model.starts_with("o1")
        || model.starts_with("o3")
    {
        Some("openai")
    } else {
        None
    }
}

/// The model name sent on the wire. Routing prefixes are dropped, except for
/// openrouter which expects `vendor/model` ids.
fn wire_model<'a>(provider_name: &str, model: &'a str) -> &'a str {
    match provider_name {
        "openrouter" => model.strip_prefix("openrouter/").unwrap_or(model),
        other => model
            .strip_prefix(other)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(model),
    }
}

/// First configured provider with an API key, used when the model prefix
/// says nothing.
fn fallback_provider_name(config: &Config) -> Option<&'static str> {
    ["openai", "openrouter", "deepseek"]
        .into_iter()
        .find(|name| config.api_key_for(name).is_some())
        .or_else(|| config.providers.contains_key("ollama").then_some("ollama"))
}

/// Unified provider construction.
///
/// Resolution order:
/// 1. `explicit_provider` (from `agents.defaults.provider`)
/// 2. the model prefix (`openai/...`, `gpt-...`, `ollama/...`)
/// 3. the first provider in config with a usable API key
pub fn create_provider(
    config: &Config,
    model: &str,
    explicit_provider: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let max_tokens = config.agents.defaults.max_tokens;
    let temperature = config.agents.defaults.temperature;

    let effective_provider: &str = if let Some(ep) = explicit_provider {
        ep
    } else if let Some(inferred) = infer_provider_from_model(model) {
        inferred
    } else if let Some(fallback) = fallback_provider_name(config) {
        fallback
    } else {
        return Err(anyhow::anyhow!(
            "No LLM provider configured. Set 'provider' in config, use a recognized model prefix \
             (e.g. 'openai/gpt-4o', 'ollama/llama3'), or add an API key to the providers section."
        ));
    };

    let provider_cfg = config.get_provider(effective_provider);
    if explicit_provider.is_some() && provider_cfg.is_none() {
        return Err(anyhow::anyhow!(
            "Provider '{}' is explicitly configured but not found in providers section",
            effective_provider
        ));
    }

    // ollama runs locally and does not check the key
    let api_key = match config.api_key_for(effective_provider) {
        Some(key) => key,
        None if effective_provider == "ollama" => "ollama".to_string(),
        None => {
            return Err(anyhow::anyhow!(
                "Provider '{}' has no API key (set providers.{}.apiKey or {}_API_KEY)",
                effective_provider,
                effective_provider,
                effective_provider.to_uppercase()
            ));
        }
    };

    let api_base = provider_cfg
        .and_then(|p| p.api_base.as_deref())
        .unwrap_or_else(|| default_api_base(effective_provider));
    let model = wire_model(effective_provider, model);

    debug!(provider = effective_provider, model, api_base, "Provider resolved");
    Ok(Box::new(OpenAIProvider::new(
        &api_key,
        Some(api_base),
        model,
        max_tokens,
        temperature,
    )))
}

/// Provider for the main loop, driven by `agents.defaults`.
pub fn create_main_provider(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    let model = &config.agents.defaults.model;
    let explicit_provider = config.agents.defaults.provider.as_deref();
    create_provider(config, model, explicit_provider)
}
