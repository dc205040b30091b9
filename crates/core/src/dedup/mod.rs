//! In-flight request deduplication
//!
//! Concurrent identical requests (same fingerprint, GET/PUT/PATCH) attach to
//! one pending operation and all observe its settled result.
//!
//! The registry keeps only weak handles, so a pending operation that every
//! caller abandoned is dropped instead of lingering. Each registration
//! carries a [`Ticket`]; [`DeduplicationRegistry::release`] removes an entry
//! only when the ticket matches, which makes a late release from an older
//! generation a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use steadfast_domain::{ApiResponse, ApiResult, Fingerprint};
use tracing::debug;

/// A settled-once response handle that any number of callers can await
pub type SharedResponse = Shared<BoxFuture<'static, ApiResult<ApiResponse>>>;

type WeakResponse = WeakShared<BoxFuture<'static, ApiResult<ApiResponse>>>;

/// Identifies one registration of a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub fingerprint: Fingerprint,
    id: u64,
}

/// Outcome of [`DeduplicationRegistry::join_or_register`]
pub enum Joined {
    /// A matching request was already in flight
    Follower(SharedResponse),
    /// This caller registered the pending operation
    Leader(SharedResponse),
}

impl Joined {
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader(_))
    }

    pub fn into_pending(self) -> SharedResponse {
        match self {
            Self::Follower(pending) | Self::Leader(pending) => pending,
        }
    }
}

struct InFlight {
    id: u64,
    pending: WeakResponse,
}

/// Registry of in-flight requests keyed by fingerprint
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct DeduplicationRegistry {
    inflight: Arc<Mutex<HashMap<Fingerprint, InFlight>>>,
    next_id: Arc<AtomicU64>,
}

impl DeduplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending operation for `fingerprint`, if one is still alive
    pub fn join(&self, fingerprint: &Fingerprint) -> Option<SharedResponse> {
        self.inflight.lock().get(fingerprint).and_then(|entry| entry.pending.upgrade())
    }

    /// Register `pending` under `ticket`, replacing any previous entry
    pub fn register(&self, ticket: Ticket, pending: &SharedResponse) {
        if let Some(weak) = pending.downgrade() {
            let entry = InFlight { id: ticket.id, pending: weak };
            self.inflight.lock().insert(ticket.fingerprint, entry);
        }
    }

    /// Reserve a ticket for a registration of `fingerprint`
    pub fn ticket(&self, fingerprint: Fingerprint) -> Ticket {
        Ticket { fingerprint, id: self.next_id.fetch_add(1, Ordering::Relaxed) }
    }

    /// Remove the entry registered under `ticket`
    ///
    /// Returns `false` when the entry is already gone or belongs to a newer
    /// registration.
    pub fn release(&self, ticket: &Ticket) -> bool {
        let mut inflight = self.inflight.lock();
        match inflight.get(&ticket.fingerprint) {
            Some(entry) if entry.id == ticket.id => {
                inflight.remove(&ticket.fingerprint);
                debug!(fingerprint = %ticket.fingerprint.short(), "released in-flight request");
                true
            }
            _ => false,
        }
    }

    /// Join a live pending operation or register a new one atomically
    ///
    /// `start` receives the new registration's ticket and must build the
    /// operation lazily; it runs under the registry lock and must not block.
    /// The operation is expected to hold a [`ReleaseOnDrop`] for its ticket.
    pub fn join_or_register<F>(&self, fingerprint: Fingerprint, start: F) -> Joined
    where
        F: FnOnce(Ticket) -> BoxFuture<'static, ApiResult<ApiResponse>>,
    {
        let mut inflight = self.inflight.lock();
        let existing = inflight.get(&fingerprint).and_then(|entry| entry.pending.upgrade());
        if let Some(pending) = existing {
            return Joined::Follower(pending);
        }

        let ticket = self.ticket(fingerprint);
        let pending = start(ticket).shared();
        if let Some(weak) = pending.downgrade() {
            inflight.insert(fingerprint, InFlight { id: ticket.id, pending: weak });
        }
        Joined::Leader(pending)
    }

    /// Guard that releases `ticket` when dropped
    pub fn release_on_drop(&self, ticket: Ticket) -> ReleaseOnDrop {
        ReleaseOnDrop { registry: self.clone(), ticket }
    }

    pub fn len(&self) -> usize {
        self.inflight.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases a registration exactly once: when the owning operation settles
/// or is dropped
pub struct ReleaseOnDrop {
    registry: DeduplicationRegistry,
    ticket: Ticket,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.registry.release(&self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use steadfast_domain::{ApiError, HttpMethod};

    use super::*;

    fn fingerprint(path: &str) -> Fingerprint {
        Fingerprint::compute(HttpMethod::Get, path, &BTreeMap::new(), None)
    }

    fn start_counted(
        registry: &DeduplicationRegistry,
        fingerprint: Fingerprint,
        dispatches: &Arc<AtomicUsize>,
        outcome: ApiResult<ApiResponse>,
    ) -> Joined {
        let dispatches = Arc::clone(dispatches);
        registry.join_or_register(fingerprint, |ticket| {
            let release = registry.release_on_drop(ticket);
            async move {
                let _release = release;
                dispatches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                outcome
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_requests_share_one_dispatch() {
        let registry = DeduplicationRegistry::new();
        let dispatches = Arc::new(AtomicUsize::new(0));
        let key = fingerprint("/classes");

        let joined: Vec<_> = (0..5)
            .map(|_| {
                let response = Ok(ApiResponse::new(200, b"ok".to_vec()));
                start_counted(&registry, key, &dispatches, response)
            })
            .collect();
        assert_eq!(joined.iter().filter(|j| j.is_leader()).count(), 1);

        let results =
            futures::future::join_all(joined.into_iter().map(Joined::into_pending)).await;

        assert_eq!(dispatches.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_ref().map(|r| r.body.clone()) == Ok(b"ok".to_vec())));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_released() {
        let registry = DeduplicationRegistry::new();
        let dispatches = Arc::new(AtomicUsize::new(0));
        let key = fingerprint("/flaky");
        let failure = Err(ApiError::http(503, "unavailable"));

        let first = start_counted(&registry, key, &dispatches, failure.clone());
        let second = start_counted(&registry, key, &dispatches, failure);

        let (a, b) = futures::join!(first.into_pending(), second.into_pending());
        assert_eq!(a, b);
        assert!(a.is_err());
        assert!(registry.join(&key).is_none());

        // a later identical request starts a fresh dispatch
        let third =
            start_counted(&registry, key, &dispatches, Ok(ApiResponse::new(200, Vec::new())));
        assert!(third.is_leader());
        assert!(third.into_pending().await.is_ok());
        assert_eq!(dispatches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_ticket_does_not_remove_newer_registration() {
        let registry = DeduplicationRegistry::new();
        let key = fingerprint("/x");
        let old = registry.ticket(key);
        let new = registry.ticket(key);
        let pending: SharedResponse =
            async { Ok(ApiResponse::new(200, Vec::new())) }.boxed().shared();

        registry.register(new, &pending);

        assert!(!registry.release(&old));
        assert!(registry.join(&key).is_some());
        assert!(registry.release(&new));
        assert!(!registry.release(&new));
    }

    #[test]
    fn test_abandoned_operation_releases_entry() {
        let registry = DeduplicationRegistry::new();
        let key = fingerprint("/abandoned");
        let joined = registry.join_or_register(key, |ticket| {
            let release = registry.release_on_drop(ticket);
            async move {
                let _release = release;
                Ok(ApiResponse::new(200, Vec::new()))
            }
            .boxed()
        });
        assert_eq!(registry.len(), 1);

        drop(joined);

        assert!(registry.is_empty());
    }
}
