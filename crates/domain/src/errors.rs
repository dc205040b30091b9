//! Error taxonomy surfaced to callers of the client layer
//!
//! Every failure a caller can observe is an [`ApiError`]. Callers react on
//! [`ApiError::kind`] (the five wire-level classes UI code cares about) and
//! the pipeline reacts on [`ApiError::category`] (the retry/refresh routing
//! classes).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Routing categories used by the retry policy and refresh coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorCategory {
    /// No response received or timed out - retried
    TransientNetwork,
    /// 5xx - retried
    ServerError,
    /// 429 / 408 - retried with backoff
    RateLimited,
    /// Other 4xx - terminal
    ClientError,
    /// 401 - routed through the refresh coordinator
    AuthExpired,
    /// Refresh rejected - terminal, session cleared
    AuthFailed,
    /// Mutating call while disconnected - queued
    Offline,
    /// Local failure (configuration, decoding, storage, internal)
    Local,
}

/// Caller-facing classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Write captured for replay once connectivity returns
    QueuedOffline,
    /// Offline read, no healthy endpoint or connection failure
    NetworkUnreachable,
    /// No response within the request timeout
    Timeout,
    /// Server answered with this non-2xx status
    Http(u16),
    /// Session is over; the user has to log in again
    AuthFailed,
    /// Local configuration, decoding or storage failure
    Other,
}

/// Client layer error
///
/// `Clone` so a single settled result can be handed to every caller joined
/// on the same in-flight request or waiting on the same token refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum ApiError {
    #[error("Request queued for offline delivery (queue id {queue_id})")]
    QueuedOffline { queue_id: String },

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String, retry_after: Option<Duration> },

    #[error("Authentication failed, re-login required: {0}")]
    AuthFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Build an HTTP status error without a `Retry-After` hint
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http { status, body: body.into(), retry_after: None }
    }

    /// Routing category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::QueuedOffline { .. } => ApiErrorCategory::Offline,
            Self::NetworkUnreachable(_) | Self::Timeout(_) => ApiErrorCategory::TransientNetwork,
            Self::Http { status, .. } => match *status {
                401 => ApiErrorCategory::AuthExpired,
                408 | 429 => ApiErrorCategory::RateLimited,
                500..=599 => ApiErrorCategory::ServerError,
                _ => ApiErrorCategory::ClientError,
            },
            Self::AuthFailed(_) => ApiErrorCategory::AuthFailed,
            Self::Config(_) | Self::Decode(_) | Self::Storage(_) | Self::Internal(_) => {
                ApiErrorCategory::Local
            }
        }
    }

    /// Caller-facing classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueuedOffline { .. } => ErrorKind::QueuedOffline,
            Self::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Http { status, .. } => ErrorKind::Http(*status),
            Self::AuthFailed(_) => ErrorKind::AuthFailed,
            Self::Config(_) | Self::Decode(_) | Self::Storage(_) | Self::Internal(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Whether the failure class is eligible for retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::TransientNetwork
                | ApiErrorCategory::ServerError
                | ApiErrorCategory::RateLimited
        )
    }

    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided `Retry-After` hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_categories() {
        assert_eq!(ApiError::http(401, "").category(), ApiErrorCategory::AuthExpired);
        assert_eq!(ApiError::http(408, "").category(), ApiErrorCategory::RateLimited);
        assert_eq!(ApiError::http(429, "").category(), ApiErrorCategory::RateLimited);
        assert_eq!(ApiError::http(500, "").category(), ApiErrorCategory::ServerError);
        assert_eq!(ApiError::http(503, "").category(), ApiErrorCategory::ServerError);
        assert_eq!(ApiError::http(403, "").category(), ApiErrorCategory::ClientError);
        assert_eq!(ApiError::http(422, "").category(), ApiErrorCategory::ClientError);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::NetworkUnreachable("refused".into()).is_transient());
        assert!(ApiError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ApiError::http(502, "").is_transient());
        assert!(ApiError::http(429, "").is_transient());
        assert!(!ApiError::http(400, "").is_transient());
        assert!(!ApiError::http(401, "").is_transient());
        assert!(!ApiError::AuthFailed("expired".into()).is_transient());
        assert!(!ApiError::QueuedOffline { queue_id: "q".into() }.is_transient());
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        let queued = ApiError::QueuedOffline { queue_id: "1".into() };
        assert_eq!(queued.kind(), ErrorKind::QueuedOffline);
        assert_eq!(ApiError::http(404, "missing").kind(), ErrorKind::Http(404));
        assert_eq!(ApiError::AuthFailed("x".into()).kind(), ErrorKind::AuthFailed);
        assert_eq!(ApiError::Decode("bad json".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_retry_after_only_on_http() {
        let err = ApiError::Http {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(ApiError::Timeout(Duration::from_secs(1)).retry_after(), None);
    }
}
