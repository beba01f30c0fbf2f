pub mod chat;
pub mod clear;
pub mod init;
pub mod serve;
pub mod tools;

use parley_config::AppConfig;
use parley_core::UserProfile;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The config file in use: `--config` or the default location.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(path);
    let config =
        AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}"))?;
    debug!(path = %path.display(), provider = %config.provider, "Configuration loaded");
    Ok(config)
}

/// Fail early with setup instructions when no key is available.
pub fn require_api_key(config: &AppConfig, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() || config.provider == "ollama" {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    PARLEY_API_KEY=sk-...   (generic)");
    eprintln!("    OPENAI_API_KEY=sk-...   (for OpenAI direct)");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", config_path(path).display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

pub fn resolve_user(config: &AppConfig, id: &str) -> Result<UserProfile, Box<dyn std::error::Error>> {
    config
        .user_by_id(id)
        .ok_or_else(|| format!("Unknown user '{id}'. Add it under [[users]] in config.toml.").into())
}
