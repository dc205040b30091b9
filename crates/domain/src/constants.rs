//! Domain-level constants
//!
//! Defaults shared by the configuration types and the client components.

// Endpoint selection
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_RECHECK_INTERVAL_MS: u64 = 5_000;

// Requests
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_AUTH_PATH_PREFIX: &str = "/auth/";

// Response cache
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 512;

// Retry policy
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_RETRY_MAX_JITTER_MS: u64 = 1_000;

// Offline queue
pub const DEFAULT_QUEUE_MAX_RETRIES: u32 = 3;

// Credential storage keys
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_PAYLOAD_KEY: &str = "user";

// Wire headers
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const RETRY_AFTER_HEADER: &str = "retry-after";
