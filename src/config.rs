//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MIMESIEVE_CONFIG` (environment variable)
//! 2. `~/.config/mimesieve/config.toml` (Linux/macOS)
//!    `%APPDATA%\mimesieve\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default cap on a single logical header, in bytes. Generous: typical MTAs
/// refuse mail long before one header reaches 100 kbytes.
pub const DEFAULT_HEADER_LIMIT: usize = 102_400;

/// Default multipart nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Default cap on a stored boundary string, in bytes. RFC 2046 says 70;
/// real mail exceeds that, so the default leaves ample room.
pub const DEFAULT_MAX_BOUNDARY_LEN: usize = 2048;

/// Hard limits captured by each parser instance at construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Cap on a single logical header, in bytes. Text beyond the cap is
    /// discarded.
    pub header_limit: usize,
    /// Multipart nesting limit. Boundaries beyond it are ignored.
    pub max_depth: usize,
    /// Cap on a stored boundary string, in bytes. Longer boundaries are
    /// truncated, which still matches their delimiter lines by prefix.
    pub max_boundary_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            header_limit: DEFAULT_HEADER_LIMIT,
            max_depth: DEFAULT_MAX_DEPTH,
            max_boundary_len: DEFAULT_MAX_BOUNDARY_LEN,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Parser hard limits.
    pub limits: Limits,
    /// Which anomalies the `check` command reports.
    pub report: ReportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Maximum record length before long physical lines are split.
    pub max_record_len: usize,
}

/// Anomaly reporting toggles for the `check` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report truncated headers.
    pub trunc_header: bool,
    /// Report 8-bit bytes in headers.
    pub eight_bit_in_header: bool,
    /// Report 8-bit bytes in nominally 7-bit bodies.
    pub eight_bit_in_7bit_body: bool,
    /// Report inconsistent composite encodings.
    pub encoding_domain: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            max_record_len: crate::parser::record::DEFAULT_MAX_RECORD_LEN,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            trunc_header: true,
            eight_bit_in_header: true,
            eight_bit_in_7bit_body: true,
            encoding_domain: true,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MIMESIEVE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mimesieve").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mimesieve")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mimesieve.log")
}
