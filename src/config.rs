//! Configuration types for the liebe client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LiebeError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiebeConfig {
    /// Backend connection settings.
    pub server: ServerConfig,
    /// Chat session settings.
    pub chat: ChatConfig,
    /// Alarm scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Morning briefing settings.
    pub briefing: BriefingConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the assistant backend, without a trailing path.
    pub base_url: String,
    /// Request timeout in seconds. For chat, bounds only the wait for the
    /// reply to start streaming.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_owned(),
            request_timeout_secs: 120,
        }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum number of history messages kept and sent with each request.
    pub history_limit: usize,
    /// Ask the backend to ground replies with a web search.
    pub search_enabled: bool,
    /// Ask the backend for a slower, more deliberate reply.
    pub deep_thinking_enabled: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: crate::session::DEFAULT_HISTORY_LIMIT,
            search_enabled: false,
            deep_thinking_enabled: false,
        }
    }
}

/// Alarm scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between scheduler ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// How far ahead of a clock alarm preparation starts, in seconds.
    pub prepare_window_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            prepare_window_secs: crate::scheduler::DEFAULT_PREPARE_WINDOW_SECS,
        }
    }
}

impl SchedulerConfig {
    /// Tick interval as a [`std::time::Duration`].
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }

    /// Preparation look-ahead as a [`chrono::Duration`].
    pub fn prepare_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.prepare_window_secs)
    }
}

/// Morning briefing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefingConfig {
    /// Whether alarms trigger a morning briefing.
    pub enabled: bool,
    /// City used for the weather portion of the briefing.
    pub city: String,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            city: "Mumbai".to_owned(),
        }
    }
}

impl LiebeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LiebeError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LiebeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/liebe/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp/liebe-config"))
            .join("liebe")
            .join("config.toml")
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let url = self.server.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LiebeError::Config(format!(
                "server.base_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(LiebeError::Config(
                "server.request_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        if self.chat.history_limit == 0 {
            return Err(LiebeError::Config(
                "chat.history_limit must be greater than zero".to_owned(),
            ));
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(LiebeError::Config(
                "scheduler.tick_interval_ms must be greater than zero".to_owned(),
            ));
        }
        if self.scheduler.prepare_window_secs <= 0 {
            return Err(LiebeError::Config(
                "scheduler.prepare_window_secs must be positive".to_owned(),
            ));
        }
        if self.briefing.enabled && self.briefing.city.trim().is_empty() {
            return Err(LiebeError::Config(
                "briefing.city must be set when briefings are enabled".to_owned(),
            ));
        }
        Ok(())
    }
}
