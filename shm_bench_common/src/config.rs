//! Configuration loading traits and types.
//!
//! The server reads one TOML file with a `[shared]` table (logging and
//! instance name) and a `[server]` table (IPC key and poll interval).
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "shm_bench_server"
//!
//! [server]
//! ipc_key = 0x53484d42
//! poll_interval_ms = 1000
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use shm_bench_common::config::{BenchConfig, ConfigError, ConfigLoader};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = BenchConfig::load(Path::new("server.toml"))?;
//!     config.validate()?;
//!     println!("Key: {:#x}", config.server.ipc_key);
//!     Ok(())
//! }
//! ```

use crate::consts::{DEFAULT_IPC_KEY, DEFAULT_POLL_INTERVAL_MS, IpcKey, MAX_POLL_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields: logging and instance name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "shm_bench_server".to_string()
}

/// Benchmark server parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Key shared by the segment and the semaphore set.
    #[serde(default = "default_ipc_key")]
    pub ipc_key: IpcKey,

    /// Sleep between two readiness checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ipc_key: DEFAULT_IPC_KEY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Config with the given key and default interval.
    pub fn with_key(ipc_key: IpcKey) -> Self {
        Self {
            ipc_key,
            ..Self::default()
        }
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `ipc_key` is `IPC_PRIVATE` (0), which a client can never open
    /// - `poll_interval_ms` is 0 or above the accepted maximum
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ipc_key == libc::IPC_PRIVATE {
            return Err(ConfigError::ValidationError(
                "ipc_key cannot be IPC_PRIVATE (0)".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::ValidationError(format!(
                "poll_interval_ms must be in 1..={MAX_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            )));
        }
        Ok(())
    }
}

fn default_ipc_key() -> IpcKey {
    DEFAULT_IPC_KEY
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Parse an IPC key given in decimal or as `0x`-prefixed hex.
///
/// Hex keys above `0x7fffffff` keep their bit pattern (`key_t` is signed).
pub fn parse_ipc_key(s: &str) -> Result<IpcKey, ConfigError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16).map(|v| v as IpcKey),
        None => s.parse::<IpcKey>(),
    };
    parsed.map_err(|e| ConfigError::ValidationError(format!("invalid ipc key '{s}': {e}")))
}

/// Complete server configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// `[shared]` table.
    #[serde(default)]
    pub shared: SharedConfig,

    /// `[server]` table.
    #[serde(default)]
    pub server: ServerConfig,
}

impl BenchConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.server.validate()
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
