//! Single-flight token refresh
//!
//! The first caller that needs a refresh becomes the leader and performs the
//! one outbound refresh call. Callers arriving while that call is in flight
//! become waiters and are released with the leader's outcome. The waiter list
//! only exists inside [`RefreshState::Refreshing`] and is drained in the same
//! critical section that returns the state to `Idle`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use steadfast_domain::{ApiError, ApiResult, SessionEvent, TokenPair};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, instrument, warn};

use super::ports::{CredentialStore, RefreshFailure, TokenRefresher};

const SESSION_EVENT_CAPACITY: usize = 32;

type Waiter = oneshot::Sender<ApiResult<String>>;

enum RefreshState {
    Idle,
    Refreshing(Vec<Waiter>),
}

/// Coordinates access-token refreshes so at most one refresh call is in
/// flight at any time
pub struct TokenRefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    events: broadcast::Sender<SessionEvent>,
    refresh_calls: AtomicU64,
}

impl TokenRefreshCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            state: Mutex::new(RefreshState::Idle),
            store,
            refresher,
            events,
            refresh_calls: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Publish a session event; having no subscribers is fine
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Number of outbound refresh calls made so far
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing(_))
    }

    /// Store a freshly issued token pair
    pub async fn start_session(&self, tokens: &TokenPair) -> ApiResult<()> {
        self.store.set_pair(tokens).await
    }

    /// Remove stored credentials and announce why
    pub async fn end_session(&self, event: SessionEvent) -> ApiResult<()> {
        self.store.purge().await?;
        self.emit(event);
        Ok(())
    }

    /// Obtain a fresh access token after `rejected` came back with a 401
    ///
    /// If the stored token already differs from `rejected`, another request
    /// finished a refresh in the meantime and the stored token is returned
    /// without a new refresh call.
    ///
    /// # Errors
    /// - `ApiError::AuthFailed` when no refresh token is stored or the
    ///   refresh endpoint rejected it; stored credentials are purged and
    ///   `SessionEvent::Expired` is emitted
    /// - the refresh call's own error when it failed without a verdict
    ///   (network, timeout, 5xx); credentials are left in place
    #[instrument(skip_all)]
    pub async fn refresh(&self, rejected: Option<&str>) -> ApiResult<String> {
        if let Some(current) = self.rotated_since(rejected).await? {
            return Ok(current);
        }

        let waiting = {
            let mut state = self.state.lock();
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    debug!(waiters = waiters.len(), "joined in-flight token refresh");
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiting {
            return rx.await.unwrap_or_else(|_| {
                Err(ApiError::Internal("token refresh was abandoned before completing".into()))
            });
        }

        let guard = LeaderGuard { coordinator: self, settled: false };
        let outcome = self.lead(rejected).await;
        guard.settle(&outcome);
        outcome
    }

    async fn rotated_since(&self, rejected: Option<&str>) -> ApiResult<Option<String>> {
        let Some(rejected) = rejected else {
            return Ok(None);
        };
        Ok(self.store.access_token().await?.filter(|current| current != rejected))
    }

    async fn lead(&self, rejected: Option<&str>) -> ApiResult<String> {
        // a refresh may have settled between the check in `refresh` and
        // winning the state transition
        if let Some(current) = self.rotated_since(rejected).await? {
            return Ok(current);
        }

        let Some(refresh_token) = self.store.refresh_token().await? else {
            warn!("no refresh token stored, session cannot be renewed");
            self.expire("no refresh token available").await;
            return Err(ApiError::AuthFailed("no refresh token available".into()));
        };

        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        info!("refreshing access token");

        match self.refresher.refresh(&refresh_token).await {
            Ok(tokens) => {
                self.store.set_pair(&tokens).await?;
                self.emit(SessionEvent::Refreshed);
                info!("access token refreshed");
                Ok(tokens.access_token)
            }
            Err(RefreshFailure::Rejected(status)) => {
                warn!(status, "refresh token rejected, clearing session");
                let reason = format!("refresh rejected with status {status}");
                self.expire(&reason).await;
                Err(ApiError::AuthFailed(reason))
            }
            Err(RefreshFailure::Unavailable(error)) => {
                warn!(error = %error, "token refresh failed, keeping stored tokens");
                Err(error)
            }
        }
    }

    async fn expire(&self, reason: &str) {
        if let Err(error) = self.store.purge().await {
            warn!(error = %error, "failed to purge credentials");
        }
        self.emit(SessionEvent::Expired { reason: reason.to_string() });
    }

    fn drain(&self) -> Vec<Waiter> {
        match std::mem::replace(&mut *self.state.lock(), RefreshState::Idle) {
            RefreshState::Refreshing(waiters) => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }
}

/// Returns the coordinator to `Idle` even if the leading task is dropped
/// mid-refresh, so waiters are never stranded
struct LeaderGuard<'a> {
    coordinator: &'a TokenRefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: &ApiResult<String>) {
        self.settled = true;
        let waiters = self.coordinator.drain();
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "releasing refresh waiters");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        for waiter in self.coordinator.drain() {
            let _ = waiter.send(Err(ApiError::Internal("token refresh was cancelled".into())));
        }
    }
}
