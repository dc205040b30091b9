//! Request pipeline
//!
//! Every outbound call passes through [`Stage::ORDER`]: endpoint resolution,
//! bearer token attachment, fingerprinting, the offline gate, the response
//! cache, in-flight deduplication, dispatch with recovery (retry, token
//! refresh, failover) and finally settlement into the cache.
//!
//! The pipeline owns every collaborator; nothing here is process-global, so
//! several pipelines (or test instances) can coexist.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use steadfast_common::resilience::RetryPolicy;
use steadfast_common::CacheStats;
use steadfast_core::{
    drain_queue, CredentialStore, DeduplicationRegistry, HttpRetryPolicy, NetworkMonitor,
    OfflineQueue, QueueReplayer, RequestCache, TokenRefreshCoordinator, TokenRefresher,
};
use steadfast_domain::constants::{AUTHORIZATION_HEADER, RETRY_AFTER_HEADER};
use steadfast_domain::{
    ApiError, ApiResponse, ApiResult, ClientConfig, EnqueueOptions, ErrorKind, FlushReport,
    HttpMethod, QueueItem, RequestEnvelope, SessionEvent, TokenPair,
};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use url::{form_urlencoded, Url};

use super::endpoint::{endpoint_url, EndpointResolver, EndpointSelection};
use super::refresher::HttpTokenRefresher;
use super::stage::Stage;
use crate::errors::conversions::parse_retry_after;
use crate::errors::http_status_error;
use crate::http::HttpClient;
use crate::network::WatchNetworkMonitor;
use crate::observability::{ClientMetrics, ClientMetricsSnapshot};
use crate::queue::{FileOfflineQueue, InMemoryOfflineQueue};
use crate::storage::KeychainCredentialStore;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    /// Caller-facing request: retried, may fail over
    Live,
    /// Offline queue replay: one attempt, the queue keeps its own budget
    Replay,
}

/// Resilient API client
///
/// Cheap to clone; clones share caches, in-flight requests and session state.
#[derive(Clone)]
pub struct RequestPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: ClientConfig,
    http: HttpClient,
    resolver: Arc<EndpointResolver>,
    coordinator: TokenRefreshCoordinator,
    cache: RequestCache,
    dedup: DeduplicationRegistry,
    retry: HttpRetryPolicy,
    queue: Arc<dyn OfflineQueue>,
    network: Arc<dyn NetworkMonitor>,
    metrics: ClientMetrics,
    /// Bumped whenever the session is invalidated; responses that started
    /// under an older epoch are not cached
    session_epoch: AtomicU64,
    flushing: Mutex<()>,
}

impl RequestPipeline {
    /// Start configuring a pipeline for `config`
    pub fn builder(config: ClientConfig) -> RequestPipelineBuilder {
        RequestPipelineBuilder::new(config)
    }

    /// Probe the configured endpoints and commit to the first healthy one
    ///
    /// Selecting anything other than the previously active endpoint discards
    /// stored credentials and emits [`SessionEvent::EndpointChanged`].
    ///
    /// # Errors
    /// `ApiError::NetworkUnreachable` when no endpoint is healthy; requests
    /// then fail fast until a later selection succeeds.
    pub async fn initialize(&self) -> ApiResult<Url> {
        self.inner.initialize().await
    }

    /// Run one request through the pipeline
    ///
    /// Mutating requests issued while offline are queued with default
    /// options and reported as `ApiError::QueuedOffline`.
    pub async fn execute(&self, envelope: RequestEnvelope) -> ApiResult<ApiResponse> {
        self.execute_with(envelope, EnqueueOptions::default()).await
    }

    /// Run one request, using `queue_options` if it has to be queued offline
    #[instrument(
        name = "pipeline.execute",
        skip_all,
        fields(
            method = %envelope.method(),
            path = %envelope.path(),
            fingerprint = %envelope.fingerprint().short(),
        )
    )]
    pub async fn execute_with(
        &self,
        mut envelope: RequestEnvelope,
        queue_options: EnqueueOptions,
    ) -> ApiResult<ApiResponse> {
        let inner = &self.inner;

        Stage::ResolveEndpoint.enter();
        let base = inner.resolver.resolve_active();

        Stage::AttachCredentials.enter();
        let mut token = inner.attach_token(&mut envelope).await?;

        Stage::Fingerprint.enter();
        let fingerprint = envelope.fingerprint();

        Stage::OfflineGate.enter();
        if !inner.network.is_online() {
            return Err(inner.park_offline(&envelope, queue_options).await);
        }
        let base = match base {
            Ok(base) => base,
            Err(_) => {
                let base = inner.reselect_endpoint().await?;
                token = inner.attach_token(&mut envelope).await?;
                base
            }
        };

        Stage::CacheLookup.enter();
        let cacheable = inner.cache.is_eligible(envelope.method(), envelope.path());
        if cacheable {
            if let Some(hit) = inner.cache.lookup(&fingerprint) {
                inner.metrics.record_cache_hit();
                debug!("served from cache");
                return Ok(hit);
            }
            inner.metrics.record_cache_miss();
        }

        Stage::Deduplicate.enter();
        if !envelope.method().is_dedup_eligible() {
            return inner.dispatch(envelope, base, token, cacheable, DispatchMode::Live).await;
        }

        let shared = Arc::clone(&self.inner);
        let joined = inner.dedup.join_or_register(fingerprint, move |ticket| {
            let release = shared.dedup.release_on_drop(ticket);
            async move {
                let _release = release;
                shared.dispatch(envelope, base, token, cacheable, DispatchMode::Live).await
            }
            .boxed()
        });
        if !joined.is_leader() {
            inner.metrics.record_dedup_join();
            debug!("joined identical in-flight request");
        }
        joined.into_pending().await
    }

    /// GET `path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute(RequestEnvelope::get(path)).await?.json()
    }

    /// GET `path` with query parameters and decode the JSON body
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        let envelope = query.iter().fold(RequestEnvelope::get(path), |envelope, (key, value)| {
            envelope.with_query(*key, *value)
        });
        self.execute(envelope).await?.json()
    }

    /// POST `body` as JSON to `path` and decode the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpMethod::Post, path, body).await
    }

    /// PUT `body` as JSON to `path` and decode the JSON response
    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpMethod::Put, path, body).await
    }

    /// PATCH `body` as JSON to `path` and decode the JSON response
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(HttpMethod::Patch, path, body).await
    }

    /// DELETE `path` and decode the JSON response (`()` for 204)
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.execute(RequestEnvelope::new(HttpMethod::Delete, path)).await?.json()
    }

    async fn send_json<B, T>(&self, method: HttpMethod, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let envelope = RequestEnvelope::new(method, path).with_json(body)?;
        self.execute(envelope).await?.json()
    }

    /// Store the token pair issued by a login
    ///
    /// Cached responses belong to the previous identity and are dropped.
    pub async fn start_session(&self, tokens: &TokenPair) -> ApiResult<()> {
        self.inner.invalidate_cache();
        self.inner.coordinator.start_session(tokens).await
    }

    /// Drop credentials and cached responses, then emit
    /// [`SessionEvent::LoggedOut`]
    pub async fn logout(&self) -> ApiResult<()> {
        self.inner.invalidate_cache();
        self.inner.coordinator.end_session(SessionEvent::LoggedOut).await?;
        info!("logged out");
        Ok(())
    }

    /// Subscribe to session lifecycle events
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.coordinator.subscribe()
    }

    /// Replay queued writes in priority order
    ///
    /// Concurrent flushes are serialized so no item is replayed twice.
    pub async fn flush_offline_queue(&self) -> ApiResult<FlushReport> {
        self.inner.flush_offline_queue().await
    }

    /// Flush the offline queue whenever connectivity comes back
    ///
    /// The watch channel only keeps the latest state, so an offline/online
    /// blip can arrive as a single online notification; every online
    /// notification is treated as a reconnect. The task holds only a weak
    /// reference and stops once every clone of the pipeline is gone.
    pub fn spawn_connectivity_listener(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut changes = self.inner.network.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let online = changes.borrow_and_update().connected;
                let Some(inner) = weak.upgrade() else { break };
                if online {
                    inner.on_reconnect().await;
                } else {
                    info!("connectivity lost, writes will be queued");
                }
            }
            debug!("connectivity listener stopped");
        })
    }

    /// Periodically evict expired cache entries
    pub fn spawn_cache_sweeper(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.cache.sweep_interval().max(MIN_SWEEP_INTERVAL);
        tokio::spawn(sweep_cache(weak, period))
    }

    /// Point-in-time copy of the client counters
    pub fn metrics(&self) -> ClientMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Hit/miss statistics of the response cache
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Number of responses currently cached
    pub fn cached_responses(&self) -> usize {
        self.inner.cache.len()
    }

    /// Number of deduplicated requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.inner.dedup.len()
    }

    /// Outbound refresh calls made by this pipeline's coordinator
    pub fn refresh_calls(&self) -> u64 {
        self.inner.coordinator.refresh_calls()
    }

    /// Active base URL
    ///
    /// # Errors
    /// `ApiError::NetworkUnreachable` when no endpoint is available.
    pub fn active_endpoint(&self) -> ApiResult<Url> {
        self.inner.resolver.resolve_active()
    }

    /// Number of writes waiting in the offline queue
    pub async fn queued_requests(&self) -> ApiResult<usize> {
        self.inner.queue.len().await
    }

    /// Configuration the pipeline was built with
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

async fn sweep_cache(weak: Weak<PipelineInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else { break };
        let removed = inner.cache.sweep();
        if removed > 0 {
            debug!(removed, remaining = inner.cache.len(), "swept expired cache entries");
        }
    }
    debug!("cache sweeper stopped");
}

impl PipelineInner {
    async fn initialize(&self) -> ApiResult<Url> {
        let selection = self.resolver.initialize().await?;
        self.apply_selection(&selection).await;
        Ok(selection.url)
    }

    /// Rerun endpoint selection after a round that found nothing healthy
    async fn reselect_endpoint(&self) -> ApiResult<Url> {
        let selection = self.resolver.recheck().await?;
        self.apply_selection(&selection).await;
        Ok(selection.url)
    }

    async fn on_reconnect(&self) {
        info!("connectivity restored");
        if !self.resolver.is_available() {
            if let Err(error) = self.initialize().await {
                warn!(error = %error, "no endpoint healthy after reconnect");
                return;
            }
        }
        if let Err(error) = self.flush_offline_queue().await {
            warn!(error = %error, "offline queue flush failed");
        }
    }

    #[instrument(skip(self))]
    async fn flush_offline_queue(&self) -> ApiResult<FlushReport> {
        let _flushing = self.flushing.lock().await;
        let report = drain_queue(&*self.queue, self).await?;
        self.metrics.record_flush(report.replayed, report.dropped);
        Ok(report)
    }

    /// Set or clear the bearer header from the stored access token
    async fn attach_token(&self, envelope: &mut RequestEnvelope) -> ApiResult<Option<String>> {
        let token = self.coordinator.store().access_token().await?;
        match &token {
            Some(token) => envelope.set_header(AUTHORIZATION_HEADER, bearer(token)),
            None => envelope.remove_header(AUTHORIZATION_HEADER),
        }
        Ok(token)
    }

    /// Queue a mutating request, or explain why a read cannot run offline
    async fn park_offline(
        &self,
        envelope: &RequestEnvelope,
        mut options: EnqueueOptions,
    ) -> ApiError {
        let method = envelope.method();
        if !method.is_mutating() || self.config.requests.is_auth_path(envelope.path()) {
            debug!("offline, request not queueable");
            return ApiError::NetworkUnreachable("device is offline".into());
        }

        // tokens are re-attached at replay time and never persisted
        let mut headers = envelope.headers().clone();
        headers.remove(AUTHORIZATION_HEADER);
        headers.append(&mut options.headers);
        options.headers = headers;

        let path = path_with_query(envelope);
        match self.queue.enqueue(&path, method, envelope.body().cloned(), options).await {
            Ok(queue_id) => {
                self.metrics.record_offline_enqueue();
                info!(queue_id = %queue_id, "offline, request queued for replay");
                ApiError::QueuedOffline { queue_id }
            }
            Err(error) => {
                warn!(error = %error, "failed to queue offline request");
                error
            }
        }
    }

    async fn dispatch(
        &self,
        mut envelope: RequestEnvelope,
        mut base: Url,
        mut token: Option<String>,
        cacheable: bool,
        mode: DispatchMode,
    ) -> ApiResult<ApiResponse> {
        let is_auth = self.config.requests.is_auth_path(envelope.path());
        let epoch = self.session_epoch.load(Ordering::Acquire);
        let mut attempt = 1;

        loop {
            Stage::Dispatch.enter();
            self.metrics.record_dispatch();
            let error = match self.send(&base, &envelope).await {
                Ok(response) => {
                    Stage::Settle.enter();
                    if cacheable && self.session_epoch.load(Ordering::Acquire) == epoch {
                        self.cache.store(envelope.fingerprint(), response.clone());
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            Stage::Recover.enter();
            if error.status() == Some(401) && !is_auth && !envelope.auth_retried() {
                envelope.mark_auth_retried();
                let fresh = self.refresh_after_rejection(token.as_deref()).await?;
                envelope.set_header(AUTHORIZATION_HEADER, bearer(&fresh));
                token = Some(fresh);
                debug!("resubmitting with refreshed token");
                continue;
            }

            if mode == DispatchMode::Replay {
                return Err(error);
            }

            let decision = self.retry.should_retry(&error, attempt);
            let Some(delay) = self.retry.wait_for(&decision, attempt) else {
                if attempt > 1 {
                    warn!(attempts = attempt, error = %error, "request failed after retries");
                }
                return Err(error);
            };

            envelope.record_retry();
            self.metrics.record_retry();
            warn!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "retrying request"
            );

            if matches!(error, ApiError::NetworkUnreachable(_)) {
                if let Some(next) = self.fail_over(&base).await {
                    if next != base {
                        base = next;
                        token = self.attach_token(&mut envelope).await?;
                    }
                }
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One HTTP exchange; non-2xx statuses become `ApiError::Http`
    async fn send(&self, base: &Url, envelope: &RequestEnvelope) -> ApiResult<ApiResponse> {
        let url = endpoint_url(base, envelope.path(), envelope.query())?;
        let response =
            self.http.execute(envelope.method(), url, envelope.headers(), envelope.body()).await?;
        if response.is_success() {
            return Ok(response);
        }
        let retry_after = response.header(RETRY_AFTER_HEADER).and_then(parse_retry_after);
        Err(http_status_error(response.status, response.text(), retry_after))
    }

    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> ApiResult<String> {
        self.metrics.record_refresh();
        self.coordinator.refresh(rejected).await.map_err(|error| {
            if error.kind() == ErrorKind::AuthFailed {
                self.invalidate_cache();
            }
            error
        })
    }

    async fn fail_over(&self, failed: &Url) -> Option<Url> {
        match self.resolver.failover(failed).await {
            Ok(selection) => {
                if selection.switched() {
                    self.metrics.record_failover();
                }
                self.apply_selection(&selection).await;
                Some(selection.url)
            }
            Err(error) => {
                warn!(error = %error, "failover unavailable");
                None
            }
        }
    }

    /// Credentials issued by one backend are not trusted by another, and
    /// neither are the responses cached under them
    async fn apply_selection(&self, selection: &EndpointSelection) {
        let Some(from) = &selection.switched_from else {
            return;
        };
        warn!(from = %from, to = %selection.url, "endpoint changed, discarding credentials");
        self.invalidate_cache();
        let event =
            SessionEvent::EndpointChanged { from: from.to_string(), to: selection.url.to_string() };
        if let Err(error) = self.coordinator.end_session(event).await {
            warn!(error = %error, "failed to purge credentials after endpoint change");
        }
    }

    fn invalidate_cache(&self) {
        self.session_epoch.fetch_add(1, Ordering::AcqRel);
        self.cache.clear();
    }
}

#[async_trait]
impl QueueReplayer for PipelineInner {
    async fn replay(&self, item: &QueueItem) -> ApiResult<ApiResponse> {
        if !self.network.is_online() {
            return Err(ApiError::QueuedOffline { queue_id: item.id.clone() });
        }
        let base = match self.resolver.resolve_active() {
            Ok(base) => base,
            Err(_) => self.reselect_endpoint().await?,
        };

        let mut envelope = RequestEnvelope::new(item.method, &item.path);
        if let Some(body) = &item.body {
            envelope = envelope.with_body(body.clone());
        }
        for (name, value) in &item.headers {
            envelope.set_header(name.as_str(), value.as_str());
        }
        let token = self.attach_token(&mut envelope).await?;

        self.dispatch(envelope, base, token, false, DispatchMode::Replay).await
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn path_with_query(envelope: &RequestEnvelope) -> String {
    if envelope.query().is_empty() {
        return envelope.path().to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(envelope.query().iter())
        .finish();
    format!("{}?{query}", envelope.path())
}

/// Builder for [`RequestPipeline`]
///
/// Unset collaborators fall back to production defaults: the platform
/// keychain, an in-memory queue (or a file queue when
/// `queue.persistence_path` is set), an always-online monitor and the HTTP
/// refresher against the active endpoint.
pub struct RequestPipelineBuilder {
    config: ClientConfig,
    http: Option<HttpClient>,
    store: Option<Arc<dyn CredentialStore>>,
    queue: Option<Arc<dyn OfflineQueue>>,
    network: Option<Arc<dyn NetworkMonitor>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl RequestPipelineBuilder {
    /// Builder with every collaborator left at its default
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http: None, store: None, queue: None, network: None, refresher: None }
    }

    /// HTTP client used for requests, health probes and refresh calls
    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Where access and refresh tokens are kept
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Queue that captures writes made while offline
    pub fn offline_queue(mut self, queue: Arc<dyn OfflineQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Source of connectivity state
    pub fn network_monitor(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    /// Exchanges a refresh token for a new pair
    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Assemble the pipeline
    ///
    /// No endpoint is probed here; the primary is assumed active until
    /// [`RequestPipeline::initialize`] runs.
    ///
    /// # Errors
    /// `ApiError::Config` for invalid configuration, or the error from
    /// opening a persisted offline queue.
    pub async fn build(self) -> ApiResult<RequestPipeline> {
        let config = self.config;
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => HttpClient::builder().timeout(config.requests.timeout()).build()?,
        };
        let resolver = Arc::new(EndpointResolver::new(http.clone(), &config.endpoints)?);

        let store = self.store.unwrap_or_else(|| {
            Arc::new(KeychainCredentialStore::default()) as Arc<dyn CredentialStore>
        });
        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(HttpTokenRefresher::new(
                http.clone(),
                Arc::clone(&resolver),
                config.requests.refresh_path.clone(),
            )) as Arc<dyn TokenRefresher>
        });
        let queue: Arc<dyn OfflineQueue> = match (self.queue, &config.queue.persistence_path) {
            (Some(queue), _) => queue,
            (None, Some(path)) => {
                Arc::new(FileOfflineQueue::open(path, config.queue.default_max_retries).await?)
            }
            (None, None) => Arc::new(InMemoryOfflineQueue::new(config.queue.default_max_retries)),
        };
        let network = self.network.unwrap_or_else(|| {
            Arc::new(WatchNetworkMonitor::default()) as Arc<dyn NetworkMonitor>
        });

        info!(
            primary = %config.endpoints.primary_url,
            backups = config.endpoints.backup_urls.len(),
            "request pipeline ready"
        );

        Ok(RequestPipeline {
            inner: Arc::new(PipelineInner {
                cache: RequestCache::new(&config.cache, &config.requests),
                retry: HttpRetryPolicy::from_settings(&config.retry),
                coordinator: TokenRefreshCoordinator::new(store, refresher),
                dedup: DeduplicationRegistry::new(),
                metrics: ClientMetrics::new(),
                session_epoch: AtomicU64::new(0),
                flushing: Mutex::new(()),
                config,
                http,
                resolver,
                queue,
                network,
            }),
        })
    }
}
