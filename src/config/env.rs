//! Environment variable configuration.
//!
//! The deployment contract is environment-only: every knob is a bare env
//! var (`PORT`, `JWT_SECRET`, ...), read once at startup.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::{AppConfig, LogFormat, LogLevel, LoggingConfig};

/// Build the complete AppConfig from environment variables.
///
/// Only `PORT` is strictly parsed (an unparsable value is a startup error);
/// everything else falls back to its default.
pub fn build_config_from_env() -> Result<AppConfig> {
    let listen_port = match opt_env("PORT") {
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT '{v}': {e}"))?,
        None => 3001,
    };

    Ok(AppConfig {
        listen_port,
        data_dir: opt_env("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        jwt_secret: opt_env("JWT_SECRET"),
        // Verification is on unless the operator sets the literal "false".
        use_auth: std::env::var("USE_AUTH").as_deref() != Ok("false"),
        allowed_ssh_hosts: parse_csv_env("ALLOWED_SSH_HOSTS"),
        cors_origins: parse_csv_env("CORS_ORIGIN"),
        logging: LoggingConfig {
            level: opt_env("LOG_LEVEL")
                .map(|s| parse_log_level(&s))
                .transpose()?
                .unwrap_or(LogLevel::Info),
            format: opt_env("LOG_FORMAT")
                .map(|s| parse_log_format(&s))
                .transpose()?
                .unwrap_or(LogFormat::Pretty),
        },
        shutdown_timeout: parse_env("SHUTDOWN_TIMEOUT", 30),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    opt_env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_csv_env(key: &str) -> Vec<String> {
    opt_env(key)
        .map(|s| {
            s.split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_log_level(s: &str) -> Result<LogLevel> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => anyhow::bail!("invalid log level: '{s}'"),
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat> {
    match s.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        _ => anyhow::bail!("invalid log format: '{s}' (expected 'pretty' or 'json')"),
    }
}
