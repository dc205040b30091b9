//! Conversions from external infrastructure errors into [`ApiError`].
//!
//! Infra owns these mappings so the domain crate stays free of reqwest and
//! keyring types.

use std::time::Duration;

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use steadfast_domain::ApiError;

/// Explicit conversion into the client error taxonomy
pub trait IntoApiError {
    fn into_api_error(self) -> ApiError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → ApiError */
/* -------------------------------------------------------------------------- */

impl IntoApiError for KeyringError {
    fn into_api_error(self) -> ApiError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => ApiError::Storage("keychain entry not found".into()),
            BadEncoding(_) => ApiError::Storage("credential in keychain is not valid UTF-8".into()),
            TooLong(name, limit) => ApiError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                ApiError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            PlatformFailure(err) => ApiError::Storage(format!("keychain platform error: {err}")),
            NoStorageAccess(err) => {
                ApiError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => ApiError::Storage(description),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ApiError */
/* -------------------------------------------------------------------------- */

/// Map a transport failure
///
/// `timeout` is the configured request timeout, reported back to callers in
/// `ApiError::Timeout`.
pub(crate) fn transport_error(err: HttpError, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(timeout);
    }
    err.into_api_error()
}

impl IntoApiError for HttpError {
    fn into_api_error(self) -> ApiError {
        if self.is_timeout() {
            return ApiError::Timeout(Duration::ZERO);
        }

        if self.is_connect() {
            return ApiError::NetworkUnreachable(format!("connection failed: {self}"));
        }

        if let Some(status) = self.status() {
            return ApiError::http(status.as_u16(), self.to_string());
        }

        if self.is_builder() {
            return ApiError::Internal(format!("invalid request: {self}"));
        }

        if self.is_decode() {
            return ApiError::Decode(self.to_string());
        }

        // request/body errors without a response behave like a dropped link
        ApiError::NetworkUnreachable(self.to_string())
    }
}

/// Build the error for a non-success response
pub fn http_status_error(status: u16, body: String, retry_after: Option<Duration>) -> ApiError {
    ApiError::Http { status, body, retry_after }
}

/// Parse a `Retry-After` header given in delta-seconds
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
