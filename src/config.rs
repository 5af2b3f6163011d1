//! Layered configuration.
//!
//! Priority, highest first:
//! 1. CLI arguments
//! 2. Environment variables (through clap `env` attributes)
//! 3. TOML config file (`~/.config/taskflow/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config`
//! path that cannot be read is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Cli;
use crate::db::STORAGE_KEY;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// TOML file layout. Every field is optional so a file can override a subset.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ConfigFile {
    storage: StorageFileConfig,
    ai: AiFileConfig,
    ui: UiFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AiFileConfig {
    enabled: Option<bool>,
    api_key: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
}

/// Settings for the suggestion service.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl AiConfig {
    /// Whether a remote assistant should be constructed at all.
    pub fn is_usable(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Location of the task slot file.
    pub storage_path: PathBuf,
    pub ai: AiConfig,
    /// Poll timeout of the TUI event loop.
    pub poll_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            ai: AiConfig::default(),
            poll_timeout: Duration::from_millis(50),
        }
    }
}

impl AppConfig {
    /// Merge CLI arguments, environment and the config file.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &Cli, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let ai_defaults = defaults.ai;

        Self {
            storage_path: cli
                .db
                .clone()
                .or_else(|| file.storage.path.clone())
                .unwrap_or(defaults.storage_path),
            ai: AiConfig {
                enabled: !cli.no_ai && file.ai.enabled.unwrap_or(ai_defaults.enabled),
                api_key: cli
                    .api_key
                    .clone()
                    .or_else(|| file.ai.api_key.clone())
                    .filter(|k| !k.trim().is_empty()),
                model: file.ai.model.clone().unwrap_or(ai_defaults.model),
                endpoint: file
                    .ai
                    .endpoint
                    .as_deref()
                    .map(|e| e.trim_end_matches('/').to_string())
                    .unwrap_or(ai_defaults.endpoint),
                timeout: file
                    .ai
                    .timeout_secs
                    .map_or(ai_defaults.timeout, Duration::from_secs),
            },
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
        }
    }
}

/// `<data dir>/taskflow/<key>.json`, or the working directory when the
/// platform has no data dir.
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("taskflow"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("{STORAGE_KEY}.json"))
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|source| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("taskflow").join("config.toml");
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}
