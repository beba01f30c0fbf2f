//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::UserProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider name, for logs and env overrides
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the chat-completions API (defaults per provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature; omitted from requests when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Known users and their bearer tokens
    #[serde(default)]
    pub users: Vec<UserConfig>,

    #[serde(default)]
    pub affiliations: AffiliationsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-5-mini".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("chat", &self.chat)
            .field("platform", &self.platform)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("users", &self.users)
            .field("affiliations", &self.affiliations)
            .field("tools", &self.tools)
            .finish()
    }
}

// ── Chat ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model calls allowed per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Stored messages read into context per turn
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Operator prompt injected after the core directive
    #[serde(default)]
    pub system_prompt: String,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_history_window() -> usize {
    20
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_window: default_history_window(),
            system_prompt: String::new(),
        }
    }
}

// ── Platform ──

/// Describes the platform the assistant speaks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_name")]
    pub name: String,

    #[serde(default = "default_platform_description")]
    pub description: String,

    #[serde(default = "default_platform_architecture")]
    pub architecture: String,

    /// Public base URL of artist link pages
    #[serde(default = "default_link_page_base")]
    pub link_page_base: String,

    /// Static network context; the network directive is only active when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_context: Option<String>,

    #[serde(default = "default_sites")]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub label: String,
    pub host: String,
    pub purpose: String,
}

fn default_platform_name() -> String {
    "Extra Chill".into()
}
fn default_platform_description() -> String {
    "an independent music journalism platform".into()
}
fn default_platform_architecture() -> String {
    "WordPress multisite network".into()
}
fn default_link_page_base() -> String {
    "https://extrachill.link".into()
}

fn site(label: &str, host: &str, purpose: &str) -> SiteConfig {
    SiteConfig {
        label: label.into(),
        host: host.into(),
        purpose: purpose.into(),
    }
}

fn default_sites() -> Vec<SiteConfig> {
    vec![
        site("Main site", "extrachill.com", "music journalism and content"),
        site("Community", "community.extrachill.com", "forums and user hub"),
        site("Shop", "shop.extrachill.com", "e-commerce"),
        site("Chat", "chat.extrachill.com", "this interface"),
        site("Artist", "artist.extrachill.com", "artist profiles"),
        site("Events", "events.extrachill.com", "event calendar"),
    ]
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: default_platform_name(),
            description: default_platform_description(),
            architecture: default_platform_architecture(),
            link_page_base: default_link_page_base(),
            network_context: None,
            sites: default_sites(),
        }
    }
}

// ── Storage ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory", "file" or "sqlite"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database file or directory; defaults under the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

pub const STORAGE_BACKENDS: &[&str] = &["memory", "file", "sqlite"];

fn default_storage_backend() -> String {
    "sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

// ── Gateway ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

// ── Users ──

#[derive(Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: String,

    /// Bearer token accepted by the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub display_name: String,

    #[serde(default)]
    pub handle: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("id", &self.id)
            .field("token", &redact(&self.token))
            .field("display_name", &self.display_name)
            .field("handle", &self.handle)
            .field("roles", &self.roles)
            .finish()
    }
}

impl UserConfig {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            handle: self.handle.clone(),
            roles: self.roles.clone(),
        }
    }
}

// ── Affiliations ──

/// Platform membership facts surfaced in the user context directive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffiliationsConfig {
    /// User ids on the team; unset disables the team fact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Vec<String>>,

    /// User ids with a community account; unset disables the fact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<Vec<String>>,

    /// Artist profiles; the artist fact and link tool need this section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<Vec<ArtistConfig>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistConfig {
    /// Owning user id
    pub owner: String,

    pub name: String,

    pub slug: String,

    #[serde(default = "default_true")]
    pub link_page: bool,
}

fn default_true() -> bool {
    true
}

// ── Tools ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool ids removed from the registry
    #[serde(default)]
    pub disabled: Vec<String>,

    /// JSON file of documents backing the network search tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_index: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PARLEY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `PARLEY_PROVIDER`
    /// - `PARLEY_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("PARLEY_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("PARLEY_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Where the selected storage backend keeps its data.
    pub fn storage_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.path {
            return path.clone();
        }
        match self.storage.backend.as_str() {
            "file" => Self::config_dir().join("conversations"),
            _ => Self::config_dir().join("parley.db"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.chat.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "chat.max_iterations must be at least 1".into(),
            ));
        }

        if self.chat.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "chat.history_window must be at least 1".into(),
            ));
        }

        if !STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be one of {}, got '{}'",
                STORAGE_BACKENDS.join(", "),
                self.storage.backend
            )));
        }

        let mut ids = HashSet::new();
        let mut tokens = HashSet::new();
        for user in &self.users {
            if !ids.insert(user.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate user id '{}'",
                    user.id
                )));
            }
            if let Some(token) = &user.token
                && !tokens.insert(token.as_str())
            {
                return Err(ConfigError::ValidationError(format!(
                    "user '{}' reuses another user's token",
                    user.id
                )));
            }
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve a bearer token to a user.
    pub fn user_for_token(&self, token: &str) -> Option<UserProfile> {
        self.users
            .iter()
            .find(|u| u.token.as_deref() == Some(token))
            .map(UserConfig::profile)
    }

    pub fn user_by_id(&self, id: &str) -> Option<UserProfile> {
        self.users.iter().find(|u| u.id == id).map(UserConfig::profile)
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: None,
            max_tokens: None,
            chat: ChatConfig::default(),
            platform: PlatformConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            users: vec![],
            affiliations: AffiliationsConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-5-mini");
        assert_eq!(config.chat.max_iterations, 10);
        assert_eq!(config.chat.history_window, 20);
        assert_eq!(config.platform.sites.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.platform.sites, config.platform.sites);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: Some(5.0),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.chat.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_storage_backend_rejected() {
        let mut config = AppConfig::default();
        config.storage.backend = "postgres".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn duplicate_tokens_rejected() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [[users]]
            id = "1"
            token = "same"
            display_name = "One"

            [[users]]
            id = "2"
            token = "same"
            display_name = "Two"
            "#,
        )
        .unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider, "openai");
    }

    #[test]
    fn loads_users_and_affiliations_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            model = "gpt-5"

            [chat]
            system_prompt = "Be brief."

            [[users]]
            id = "42"
            token = "tok-42"
            display_name = "Sam Rivera"
            handle = "samr"
            roles = ["editor"]

            [affiliations]
            team = ["42"]

            [[affiliations.artists]]
            owner = "42"
            name = "The Rivertones"
            slug = "rivertones"
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-5");
        assert_eq!(config.chat.system_prompt, "Be brief.");
        assert_eq!(config.chat.max_iterations, 10);

        let user = config.user_for_token("tok-42").unwrap();
        assert_eq!(user.display_name, "Sam Rivera");
        assert_eq!(user.current_role(), Some("editor"));
        assert!(config.user_for_token("nope").is_none());

        let artists = config.affiliations.artists.unwrap();
        assert!(artists[0].link_page);
        assert!(config.affiliations.community.is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.users.push(UserConfig {
            id: "1".into(),
            token: Some("tok-secret".into()),
            display_name: "One".into(),
            handle: String::new(),
            roles: vec![],
        });
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("tok-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-5-mini"));
        assert!(toml_str.contains("8787"));
    }

    #[test]
    fn storage_path_follows_backend() {
        let mut config = AppConfig::default();
        assert!(config.storage_path().ends_with("parley.db"));
        config.storage.backend = "file".into();
        assert!(config.storage_path().ends_with("conversations"));
        config.storage.path = Some(PathBuf::from("/data/chat"));
        assert_eq!(config.storage_path(), PathBuf::from("/data/chat"));
    }
}
