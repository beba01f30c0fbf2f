//! Chat model client for Parley.
//!
//! The conversation loop talks to exactly one configured provider through the
//! `parley_core::Provider` trait; [`build_from_config`] picks it.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use parley_config::AppConfig;
use parley_core::{Provider, ProviderError};
use std::sync::Arc;
use tracing::info;

/// Base URL for providers that speak the chat-completions protocol.
pub fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config
        .api_url
        .clone()
        .or_else(|| default_base_url(&config.provider).map(str::to_string))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{}' needs an api_url",
                config.provider
            ))
        })?;

    let api_key = match (&config.api_key, config.provider.as_str()) {
        (Some(key), _) => key.clone(),
        (None, "ollama") => "ollama".into(),
        (None, _) => {
            return Err(ProviderError::NotConfigured(
                "no API key; set api_key in config or PARLEY_API_KEY".into(),
            ));
        }
    };

    info!(provider = %config.provider, base_url = %base_url, model = %config.model, "Provider configured");
    Ok(Arc::new(OpenAiCompatProvider::new(
        config.provider.clone(),
        base_url,
        api_key,
    )))
}
