//! Port interfaces for credential storage and token refresh

use async_trait::async_trait;
use steadfast_domain::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_PAYLOAD_KEY};
use steadfast_domain::{ApiError, ApiResult, TokenPair};
use thiserror::Error;

/// Secure key/value storage for tokens and the cached user payload
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value, `None` when absent
    async fn get(&self, key: &str) -> ApiResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> ApiResult<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> ApiResult<()>;

    /// Write both tokens of a rotation together
    ///
    /// The default writes the refresh token first so a crash between the two
    /// writes leaves a pair that can still be refreshed.
    async fn set_pair(&self, tokens: &TokenPair) -> ApiResult<()> {
        self.set(REFRESH_TOKEN_KEY, &tokens.refresh_token).await?;
        self.set(ACCESS_TOKEN_KEY, &tokens.access_token).await
    }

    async fn access_token(&self) -> ApiResult<Option<String>> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    async fn refresh_token(&self) -> ApiResult<Option<String>> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    /// Remove both tokens and the cached user payload
    async fn purge(&self) -> ApiResult<()> {
        self.delete(ACCESS_TOKEN_KEY).await?;
        self.delete(REFRESH_TOKEN_KEY).await?;
        self.delete(USER_PAYLOAD_KEY).await
    }
}

/// Why a refresh call did not produce new tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// The refresh endpoint answered 401/403: the refresh token is dead
    #[error("refresh rejected with status {0}")]
    Rejected(u16),

    /// No usable answer (network failure, timeout, 5xx); tokens stay put
    #[error(transparent)]
    Unavailable(ApiError),
}

/// Exchanges a refresh token for a new token pair
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure>;
}
