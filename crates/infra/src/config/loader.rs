//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when `STEADFAST_PRIMARY_URL` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//!
//! ## Environment Variables
//! - `STEADFAST_PRIMARY_URL`: primary base URL (required for env loading)
//! - `STEADFAST_BACKUP_URLS`: comma-separated backup base URLs
//! - `STEADFAST_REQUEST_TIMEOUT_MS`: per-request timeout
//! - `STEADFAST_CACHE_TTL_SECS`: response cache time-to-live
//! - `STEADFAST_MAX_ATTEMPTS`: retry ceiling, including the first attempt
//! - `STEADFAST_QUEUE_PATH`: offline queue persistence file
//!
//! Unset optional variables keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use steadfast_domain::{ApiError, ApiResult, ClientConfig};

const FILE_NAMES: [&str; 4] = ["steadfast.toml", "steadfast.json", "config.toml", "config.json"];

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> ApiResult<Self> {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("json") {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ApiError::Config(format!("Unsupported config format: {other}"))),
        }
    }
}

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ApiError::Config` if neither source yields a valid configuration.
pub fn load() -> ApiResult<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `STEADFAST_*` environment variables
///
/// # Errors
/// Returns `ApiError::Config` if `STEADFAST_PRIMARY_URL` is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> ApiResult<ClientConfig> {
    let mut config = ClientConfig::default();
    config.endpoints.primary_url = env_var("STEADFAST_PRIMARY_URL")?;

    if let Some(backups) = env_opt("STEADFAST_BACKUP_URLS") {
        config.endpoints.backup_urls = backups
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(timeout) = env_parse::<u64>("STEADFAST_REQUEST_TIMEOUT_MS")? {
        config.requests.timeout_ms = timeout;
    }
    if let Some(ttl) = env_parse::<u64>("STEADFAST_CACHE_TTL_SECS")? {
        config.cache.ttl_seconds = ttl;
    }
    if let Some(attempts) = env_parse::<u32>("STEADFAST_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(path) = env_opt("STEADFAST_QUEUE_PATH") {
        config.queue.persistence_path = Some(path);
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. The format is picked
/// from the file extension.
///
/// # Errors
/// Returns `ApiError::Config` if the file is missing, unreadable, malformed
/// or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> ApiResult<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ApiError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ApiError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ApiError::Config(format!("Failed to read config file: {e}")))?;

    load_from_str(&contents, ConfigFormat::from_path(&config_path)?)
}

/// Parse and validate configuration text
///
/// Missing sections and fields fall back to their defaults.
///
/// # Errors
/// Returns `ApiError::Config` if parsing or validation fails.
pub fn load_from_str(contents: &str, format: ConfigFormat) -> ApiResult<ClientConfig> {
    let config: ClientConfig = match format {
        ConfigFormat::Toml => toml::from_str(contents)
            .map_err(|e| ApiError::Config(format!("Invalid TOML format: {e}")))?,
        ConfigFormat::Json => serde_json::from_str(contents)
            .map_err(|e| ApiError::Config(format!("Invalid JSON format: {e}")))?,
    };
    config.validate()?;
    Ok(config)
}

/// Probe the standard locations for a config file
///
/// Looks for `steadfast.{toml,json}` then `config.{toml,json}` in the
/// working directory, its parent and grandparent, then next to the
/// executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> ApiResult<String> {
    env_opt(key)
        .ok_or_else(|| ApiError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> ApiResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ApiError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}
