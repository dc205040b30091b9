use async_trait::async_trait;
use keyring::{Entry, Error as KeyringError};
use steadfast_core::CredentialStore;
use steadfast_domain::{ApiError, ApiResult};
use tokio::task;
use tracing::debug;

use crate::errors::IntoApiError;

const DEFAULT_SERVICE_NAME: &str = "steadfast";

/// Credential store backed by the platform keychain
///
/// Keychain calls block, so each one runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KeychainCredentialStore {
    service: String,
}

impl Default for KeychainCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl KeychainCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, KeyringError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key).map_err(IntoApiError::into_api_error)?;
            op(entry).map_err(IntoApiError::into_api_error)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(err),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value)).await?;
        debug!(service = %self.service, key, "stored keychain entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(err),
        })
        .await
    }
}
