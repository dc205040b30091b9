//! Mock collaborators for tests
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for downstream integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use steadfast_domain::TokenPair;

use crate::auth::ports::{RefreshFailure, TokenRefresher};

/// Token refresher with a scripted outcome and an optional delay
///
/// Counts every call so tests can assert the single-flight property.
pub struct MockTokenRefresher {
    outcome: Mutex<Result<TokenPair, RefreshFailure>>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockTokenRefresher {
    pub fn succeeding(tokens: TokenPair) -> Self {
        Self::with_outcome(Ok(tokens))
    }

    pub fn failing(failure: RefreshFailure) -> Self {
        Self::with_outcome(Err(failure))
    }

    fn with_outcome(outcome: Result<TokenPair, RefreshFailure>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Hold every refresh call open for `delay`
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Change the outcome of subsequent calls
    pub fn set_outcome(&self, outcome: Result<TokenPair, RefreshFailure>) {
        *self.outcome.lock() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens received, in call order
    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl TokenRefresher for MockTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(refresh_token.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.lock().clone()
    }
}
