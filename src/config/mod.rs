pub mod env;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Log level enum (replaces stringly-typed field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log format enum (replaces stringly-typed field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
        }
    }
}

/// Effective service configuration, built from environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// HTTP/WebSocket listener port.
    pub listen_port: u16,
    /// Directory holding the target store (`servers.json`).
    pub data_dir: PathBuf,
    /// Symmetric key for the token verifier. Required when auth is enforced.
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    /// Token verification mode, fixed for the process lifetime.
    pub use_auth: bool,
    /// Exact-match SSH host allow-list. Empty admits every host.
    pub allowed_ssh_hosts: Vec<String>,
    /// Origins permitted on the HTTP surface. Empty disables CORS headers.
    pub cors_origins: Vec<String>,
    pub logging: LoggingConfig,
    /// Upper bound on the shutdown drain, in seconds.
    pub shutdown_timeout: u64,
}

/// Validate an already-constructed AppConfig.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.use_auth
        && config
            .jwt_secret
            .as_deref()
            .map(str::is_empty)
            .unwrap_or(true)
    {
        anyhow::bail!(
            "JWT_SECRET is required while auth is enforced (set USE_AUTH=false to disable)"
        );
    }
    Ok(())
}
