//! TOML Configuration File Support
//!
//! Loads the sidechat configuration from `~/.config/sidechat/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/sidechat/config.toml` (typically `~/.config/sidechat/config.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! host = "localhost"
//! port = 11434
//! connect_timeout_secs = 10
//!
//! [chat]
//! model = "llama3.2"
//! record_empty_aborted = true
//! history_path = "/home/me/.local/share/sidechat/history.json"
//! ```
//!
//! # Environment Variables
//!
//! - `OLLAMA_HOST`, `OLLAMA_PORT`: backend address
//! - `SIDECHAT_MODEL`: selected chat model
//! - `SIDECHAT_HISTORY`: history file path

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;
use crate::history::HistoryFile;
use crate::session::SessionConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the most specific configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Ollama host
    pub host: Option<String>,

    /// Ollama port
    pub port: Option<u16>,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Model selected at startup
    pub model: Option<String>,

    /// Record aborted replies that have no content
    pub record_empty_aborted: Option<bool>,

    /// Where the conversation is persisted
    pub history_path: Option<PathBuf>,
}

/// Root TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SidechatToml {
    /// Backend settings
    pub backend: BackendToml,

    /// Chat settings
    pub chat: ChatToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved sidechat configuration
#[derive(Clone, Debug)]
pub struct SidechatConfig {
    /// Backend connection
    pub backend: BackendConfig,

    /// Model selected at startup
    pub model: Option<String>,

    /// Record aborted replies that have no content
    pub record_empty_aborted: bool,

    /// History file override; `None` means the default location
    pub history_path: Option<PathBuf>,

    /// Whether the conversation is persisted at all
    pub history_enabled: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for SidechatConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            model: None,
            record_empty_aborted: true,
            history_path: None,
            history_enabled: true,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl SidechatConfig {
    /// Where the most specific value came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Override the source (for testing)
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Session controller settings
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.model.clone(),
            record_empty_aborted: self.record_empty_aborted,
        }
    }

    /// History file to use, if persistence is enabled and a location is known
    #[must_use]
    pub fn history_file(&self) -> Option<HistoryFile> {
        if !self.history_enabled {
            return None;
        }
        self.history_path
            .clone()
            .or_else(HistoryFile::default_path)
            .map(HistoryFile::new)
    }

    /// Reject values that cannot work
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend host must not be empty".to_string(),
            ));
        }
        if self.backend.port == 0 {
            return Err(ConfigError::ValidationError(
                "backend port must be between 1 and 65535".to_string(),
            ));
        }
        if self.backend.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "connect timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default config file path
///
/// Returns `$XDG_CONFIG_HOME/sidechat/config.toml` or `~/.config/sidechat/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sidechat").join("config.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read, parsed or
/// validated.
pub fn load_config() -> Result<SidechatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// A missing file is not an error; defaults are used instead.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read, parsed or
/// validated.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SidechatConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<SidechatConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = SidechatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: SidechatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut SidechatConfig, toml: &SidechatToml) {
    if let Some(ref host) = toml.backend.host {
        config.backend.host = host.clone();
    }
    if let Some(port) = toml.backend.port {
        config.backend.port = port;
    }
    if let Some(secs) = toml.backend.connect_timeout_secs {
        config.backend.connect_timeout = Duration::from_secs(secs);
    }

    if toml.chat.model.is_some() {
        config.model = toml.chat.model.clone();
    }
    if let Some(record) = toml.chat.record_empty_aborted {
        config.record_empty_aborted = record;
    }
    if toml.chat.history_path.is_some() {
        config.history_path = toml.chat.history_path.clone();
    }
}

fn apply_env_config<F>(config: &mut SidechatConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env("OLLAMA_HOST") {
        config.backend.host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("OLLAMA_PORT") {
        match port.parse::<u16>() {
            Ok(port) => {
                config.backend.port = port;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %port, "Ignoring invalid OLLAMA_PORT"),
        }
    }
    if let Some(model) = env("SIDECHAT_MODEL") {
        config.model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(path) = env("SIDECHAT_HISTORY") {
        config.history_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// CLI overrides applied on top of file and environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Override backend host
    pub host: Option<String>,

    /// Override backend port
    pub port: Option<u16>,

    /// Override the selected model
    pub model: Option<String>,

    /// Override the history file path
    pub history_path: Option<PathBuf>,

    /// Disable history persistence
    pub no_history: bool,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend host override
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set backend port override
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set history path override
    #[must_use]
    pub fn with_history_path(mut self, path: PathBuf) -> Self {
        self.history_path = Some(path);
        self
    }

    /// Disable history persistence
    #[must_use]
    pub fn without_history(mut self) -> Self {
        self.no_history = true;
        self
    }

    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.model.is_none()
            && self.history_path.is_none()
            && !self.no_history
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override produces an
    /// unusable configuration.
    pub fn apply(&self, config: &mut SidechatConfig) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }
        config.source = ConfigSource::Cli;

        if let Some(ref host) = self.host {
            config.backend.host = host.clone();
        }
        if let Some(port) = self.port {
            config.backend.port = port;
        }
        if let Some(ref model) = self.model {
            config.model = Some(model.clone());
        }
        if let Some(ref path) = self.history_path {
            config.history_path = Some(path.clone());
        }
        if self.no_history {
            config.history_enabled = false;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_full_toml() {
        let file = toml_file(
            r#"
[backend]
host = "gpu-box"
port = 8080
connect_timeout_secs = 3

[chat]
model = "llama3.2"
record_empty_aborted = false
history_path = "/tmp/sidechat-history.json"
"#,
        );

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.backend.host, "gpu-box");
        assert_eq!(config.backend.port, 8080);
        assert_eq!(config.backend.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.model.as_deref(), Some("llama3.2"));
        assert!(!config.record_empty_aborted);
        assert_eq!(
            config.history_path,
            Some(PathBuf::from("/tmp/sidechat-history.json"))
        );
        assert_eq!(config.config_file_path, Some(file.path().to_path_buf()));
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = toml_file("[chat]\nmodel = \"partial-model\"\n");

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.model.as_deref(), Some("partial-model"));
        assert_eq!(config.backend, BackendConfig::default());
        assert!(config.record_empty_aborted);
    }

    #[test]
    fn test_missing_file_graceful() {
        let path = PathBuf::from("/nonexistent/path/config.toml");
        let config = load_config_with_env(Some(path), no_env).unwrap();

        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.model, None);
        assert_eq!(config.config_file_path, None);
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = toml_file("[backend\nport = \"not a number\"\n");

        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_port_zero_is_rejected() {
        let file = toml_file("[backend]\nport = 0\n");

        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Priority Ordering Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[backend]\nhost = \"file-host\"\n\n[chat]\nmodel = \"file-model\"\n");
        let env = env_from(&[
            ("OLLAMA_HOST", "env-host"),
            ("SIDECHAT_MODEL", "env-model"),
            ("SIDECHAT_HISTORY", "/tmp/env-history.json"),
        ]);

        let config = load_config_with_env(Some(file.path().to_path_buf()), env).unwrap();

        assert_eq!(config.backend.host, "env-host");
        assert_eq!(config.model.as_deref(), Some("env-model"));
        assert_eq!(
            config.history_path,
            Some(PathBuf::from("/tmp/env-history.json"))
        );
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_invalid_env_port_is_ignored() {
        let config = load_config_with_env(None, env_from(&[("OLLAMA_PORT", "nope")])).unwrap();

        assert_eq!(config.backend.port, 11434);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config =
            load_config_with_env(None, env_from(&[("SIDECHAT_MODEL", "env-model")])).unwrap();

        ConfigOverrides::new()
            .with_model("cli-model")
            .with_port(9999)
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.model.as_deref(), Some("cli-model"));
        assert_eq!(config.backend.port, 9999);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = SidechatConfig::default();
        config.set_source(ConfigSource::File);

        ConfigOverrides::new().apply(&mut config).unwrap();

        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_override_to_port_zero_fails() {
        let mut config = SidechatConfig::default();
        let result = ConfigOverrides::new().with_port(0).apply(&mut config);

        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Derived Settings Tests
    // =========================================================================

    #[test]
    fn test_history_file_resolution() {
        let mut config = SidechatConfig {
            history_path: Some(PathBuf::from("/tmp/h.json")),
            ..Default::default()
        };
        assert_eq!(
            config.history_file().map(|h| h.path().to_path_buf()),
            Some(PathBuf::from("/tmp/h.json"))
        );

        ConfigOverrides::new()
            .without_history()
            .apply(&mut config)
            .unwrap();
        assert_eq!(config.history_file(), None);
    }

    #[test]
    fn test_session_config_mirrors_chat_settings() {
        let config = SidechatConfig {
            model: Some("m1".to_string()),
            record_empty_aborted: false,
            ..Default::default()
        };

        assert_eq!(
            config.session_config(),
            SessionConfig {
                model: Some("m1".to_string()),
                record_empty_aborted: false,
            }
        );
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
