use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use steadfast_core::CredentialStore;
use steadfast_domain::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use steadfast_domain::{ApiResult, TokenPair};

/// Process-local credential store for tests and headless use
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token pair
    pub fn with_tokens(tokens: &TokenPair) -> Self {
        let store = Self::new();
        insert_pair(&mut store.values.write(), tokens);
        store
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        self.values.write().remove(key);
        Ok(())
    }

    /// Both tokens land under one write lock
    async fn set_pair(&self, tokens: &TokenPair) -> ApiResult<()> {
        insert_pair(&mut self.values.write(), tokens);
        Ok(())
    }
}

fn insert_pair(values: &mut HashMap<String, String>, tokens: &TokenPair) {
    values.insert(ACCESS_TOKEN_KEY.to_string(), tokens.access_token.clone());
    values.insert(REFRESH_TOKEN_KEY.to_string(), tokens.refresh_token.clone());
}
