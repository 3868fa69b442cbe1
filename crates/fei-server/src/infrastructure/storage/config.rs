//! TOML-based configuration for the server process.
//!
//! Reads and writes [`AppConfig`] from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\FeiShare\config.toml`
//! - Linux:    `~/.config/feishare/config.toml`
//! - macOS:    `~/Library/Application Support/FeiShare/config.toml`
//!
//! ```toml
//! [server]
//! port = 8080
//! bind_address = "0.0.0.0"
//! password = "hunter2"
//!
//! [storage]
//! share_log = "shares.txt"
//! files_dir = "files"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so the server starts with
//! no file at all and keeps working when an older file lacks newer keys.
//! The port is the only value the controller reacts to at runtime: writing a
//! new port and feeding it to `FeiServer::on_receive_event` moves the
//! listener.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fei_core::domain::lifecycle::DEFAULT_PORT;

use crate::application::controller::ServerSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is present but unusable.
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// TCP port of the HTTP listener.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address to bind.  `"0.0.0.0"` exposes the server to the LAN.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Login password.  When absent every visitor is admitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Interval between SSE `ping` heartbeats.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Maximum number of chat messages kept per running session.
    #[serde(default = "default_message_cache_limit")]
    pub message_cache_limit: usize,
    /// How long a stopping listener may take to drain before it is aborted.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

/// Where the share log and imported files live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Base directory; defaults to the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// File name of the share log inside `data_dir`.
    #[serde(default = "default_share_log")]
    pub share_log: String,
    /// Directory name for imported files inside `data_dir`.
    #[serde(default = "default_files_dir")]
    pub files_dir: String,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_message_cache_limit() -> usize {
    500
}
fn default_shutdown_grace_ms() -> u64 {
    2000
}
fn default_share_log() -> String {
    "shares.txt".to_string()
}
fn default_files_dir() -> String {
    "files".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            password: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            message_cache_limit: default_message_cache_limit(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            share_log: default_share_log(),
            files_dir: default_files_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Builds the controller settings from the `[server]` table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address.
    pub fn server_settings(&self) -> Result<ServerSettings, ConfigError> {
        let bind_ip: IpAddr =
            self.server
                .bind_address
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    key: "server.bind_address",
                    reason: e.to_string(),
                })?;

        Ok(ServerSettings {
            bind_ip,
            password: self.server.password.clone(),
            heartbeat_interval: Duration::from_millis(self.server.heartbeat_interval_ms.max(1)),
            message_cache_limit: self.server.message_cache_limit.max(1),
            shutdown_grace: Duration::from_millis(self.server.shutdown_grace_ms),
        })
    }

    /// Resolves the share log and files directory paths.
    ///
    /// `fallback_dir` is used when `data_dir` is not set (normally the
    /// directory holding the config file).
    pub fn storage_paths(&self, fallback_dir: &Path) -> (PathBuf, PathBuf) {
        let base = self
            .storage
            .data_dir
            .clone()
            .unwrap_or_else(|| fallback_dir.to_path_buf());
        (
            base.join(&self.storage.share_log),
            base.join(&self.storage.files_dir),
        )
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("FeiShare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("FeiShare")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // XDG_CONFIG_HOME or ~/.config (Linux, Android, BSDs)
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("feishare"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
