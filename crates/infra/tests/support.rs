//! Shared fixtures for the pipeline integration tests

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use steadfast_core::testing::MockTokenRefresher;
use steadfast_domain::{ClientConfig, ConnectivityState, TokenPair};
use steadfast_infra::{
    InMemoryOfflineQueue, MemoryCredentialStore, RequestPipeline, WatchNetworkMonitor,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCESS: &str = "access-1";
pub const REFRESH: &str = "refresh-1";

/// Pipeline plus handles on the collaborators a test needs to drive
pub struct Harness {
    pub pipeline: RequestPipeline,
    pub store: Arc<MemoryCredentialStore>,
    pub network: Arc<WatchNetworkMonitor>,
    pub queue: Arc<InMemoryOfflineQueue>,
}

impl Harness {
    pub fn go_offline(&self) {
        self.network.set_state(ConnectivityState::offline());
    }

    pub fn go_online(&self) {
        self.network.set_state(ConnectivityState::default());
    }
}

/// Config for `base` with millisecond backoff so retry tests stay fast
pub fn fast_config(base: &str) -> ClientConfig {
    let mut config = ClientConfig::for_base_url(base);
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 20;
    config.retry.max_jitter_ms = 0;
    config.endpoints.health_timeout_ms = 500;
    config
}

/// Pipeline seeded with [`ACCESS`]/[`REFRESH`]
///
/// With no `refresher` the pipeline uses its HTTP refresher against the
/// active endpoint.
pub async fn harness(config: ClientConfig, refresher: Option<Arc<MockTokenRefresher>>) -> Harness {
    let store = Arc::new(MemoryCredentialStore::with_tokens(&TokenPair::new(ACCESS, REFRESH)));
    let network = Arc::new(WatchNetworkMonitor::default());
    let queue = Arc::new(InMemoryOfflineQueue::new(config.queue.default_max_retries));

    let mut builder = RequestPipeline::builder(config)
        .credential_store(store.clone())
        .network_monitor(network.clone())
        .offline_queue(queue.clone());
    if let Some(refresher) = refresher {
        builder = builder.token_refresher(refresher);
    }
    let pipeline = builder.build().await.expect("pipeline should build");

    Harness { pipeline, store, network, queue }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// A base URL nothing listens on
pub fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

pub async fn mount_health(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Paths of the requests `server` saw, in arrival order
pub async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
