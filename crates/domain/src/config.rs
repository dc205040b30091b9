//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_AUTH_PATH_PREFIX, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
    DEFAULT_CACHE_TTL_SECS, DEFAULT_HEALTH_PATH, DEFAULT_HEALTH_TIMEOUT_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_QUEUE_MAX_RETRIES, DEFAULT_RECHECK_INTERVAL_MS, DEFAULT_REFRESH_PATH,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_RETRY_MAX_JITTER_MS, DEFAULT_RETRY_MULTIPLIER,
};
use crate::errors::ApiError;
use crate::types::normalize_path;

/// Client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoints: EndpointConfig,
    pub requests: RequestConfig,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub queue: QueueSettings,
}

/// Candidate base URLs and health probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub primary_url: String,
    /// Tried in this order when the primary is unhealthy
    pub backup_urls: Vec<String>,
    pub health_path: String,
    pub health_timeout_ms: u64,
    /// Minimum gap between selection rounds while no endpoint is healthy
    pub recheck_interval_ms: u64,
}

/// Per-request behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub refresh_path: String,
    /// Paths starting with any of these are never cached, queued or refreshed
    pub auth_path_prefixes: Vec<String>,
}

/// Response cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub max_entries: usize,
}

/// Live retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

/// Offline queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub default_max_retries: u32,
    /// When set, the queue is persisted to this JSON file
    pub persistence_path: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://localhost:8080".to_string(),
            backup_urls: Vec::new(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            recheck_interval_ms: DEFAULT_RECHECK_INTERVAL_MS,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            auth_path_prefixes: vec![DEFAULT_AUTH_PATH_PREFIX.to_string()],
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            sweep_interval_seconds: DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            max_jitter_ms: DEFAULT_RETRY_MAX_JITTER_MS,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { default_max_retries: DEFAULT_QUEUE_MAX_RETRIES, persistence_path: None }
    }
}

impl ClientConfig {
    /// Configuration pointing at a single base URL with defaults elsewhere
    pub fn for_base_url(url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.endpoints.primary_url = url.into();
        config
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `ApiError::Config` for unparsable URLs or nonsensical retry
    /// and cache settings.
    pub fn validate(&self) -> Result<(), ApiError> {
        self.endpoints.candidates()?;

        if !self.requests.refresh_path.starts_with('/') {
            return Err(ApiError::Config(format!(
                "refresh path must start with '/': {}",
                self.requests.refresh_path
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ApiError::Config("max_attempts must be greater than 0".to_string()));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(ApiError::Config(format!(
                "retry multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.cache.ttl_seconds == 0 {
            return Err(ApiError::Config("cache ttl must be greater than 0".to_string()));
        }
        Ok(())
    }
}

impl EndpointConfig {
    /// Primary followed by backups, parsed
    pub fn candidates(&self) -> Result<Vec<Url>, ApiError> {
        std::iter::once(&self.primary_url)
            .chain(self.backup_urls.iter())
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| ApiError::Config(format!("Invalid base URL '{raw}': {e}")))
            })
            .collect()
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms)
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether `path` belongs to the authentication surface
    ///
    /// `path` is normalized first, so `auth/login` and `//auth/login` are
    /// recognized like `/auth/login`. A trailing query is ignored.
    pub fn is_auth_path(&self, path: &str) -> bool {
        let normalized = normalize_path(path);
        let route = normalized.split('?').next().unwrap_or_default();
        route == normalize_path(&self.refresh_path)
            || self
                .auth_path_prefixes
                .iter()
                .any(|prefix| route.starts_with(normalize_path(prefix).as_str()))
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_candidates_keep_priority_order() {
        let mut config = ClientConfig::for_base_url("https://a.example.com");
        config.endpoints.backup_urls =
            vec!["https://b.example.com".to_string(), "https://c.example.com".to_string()];

        let hosts: Vec<String> = config
            .endpoints
            .candidates()
            .unwrap()
            .iter()
            .map(|u| u.host_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(hosts, vec!["a.example.com", "b.example.com", "c.example.com"]);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = ClientConfig::for_base_url("not a url");
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = ClientConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_path_detection() {
        let config = RequestConfig::default();
        assert!(config.is_auth_path("/auth/login"));
        assert!(config.is_auth_path("/auth/refresh"));
        assert!(!config.is_auth_path("/classes"));
        assert!(!config.is_auth_path("/authors"));
    }

    #[test]
    fn test_auth_path_detection_normalizes_relative_paths() {
        let config = RequestConfig::default();
        assert!(config.is_auth_path("auth/login"));
        assert!(config.is_auth_path("auth/refresh"));
        assert!(config.is_auth_path("//auth/me"));
        assert!(config.is_auth_path("/classes/../auth/login"));
        assert!(config.is_auth_path("auth/login?next=%2Fhome"));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoints": {"primary_url": "https://api.example.com"}}"#)
                .unwrap();
        assert_eq!(config.endpoints.primary_url, "https://api.example.com");
        assert_eq!(config.retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    }
}
