//! Active base URL selection and failover
//!
//! Candidates are the primary URL followed by the backups in priority order.
//! Selection probes `GET <base><health_path>` with a short timeout and commits
//! to the first candidate that answers 2xx. While no candidate is healthy,
//! [`EndpointResolver::recheck`] reruns selection at most once per
//! `recheck_interval`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use steadfast_domain::{ApiError, ApiResult, EndpointConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::http::HttpClient;

/// Result of a selection round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSelection {
    pub url: Url,
    /// Previously active URL when the selection moved away from it
    pub switched_from: Option<Url>,
}

impl EndpointSelection {
    pub fn switched(&self) -> bool {
        self.switched_from.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
struct EndpointState {
    active: usize,
    available: bool,
    /// When the last full selection round finished
    selected_at: Option<Instant>,
}

/// Chooses the base URL every outbound call is sent to
pub struct EndpointResolver {
    http: HttpClient,
    candidates: Vec<Url>,
    health_path: String,
    health_timeout: Duration,
    recheck_interval: Duration,
    state: RwLock<EndpointState>,
    probing: Mutex<()>,
}

impl EndpointResolver {
    /// Build a resolver; the primary starts out active until the first probe
    ///
    /// # Errors
    /// `ApiError::Config` when a candidate URL does not parse.
    pub fn new(http: HttpClient, config: &EndpointConfig) -> ApiResult<Self> {
        Ok(Self {
            http,
            candidates: config.candidates()?,
            health_path: config.health_path.clone(),
            health_timeout: config.health_timeout(),
            recheck_interval: config.recheck_interval(),
            state: RwLock::new(EndpointState { active: 0, available: true, selected_at: None }),
            probing: Mutex::new(()),
        })
    }

    pub fn candidates(&self) -> &[Url] {
        &self.candidates
    }

    pub fn is_available(&self) -> bool {
        self.state.read().available
    }

    /// Currently active base URL
    ///
    /// # Errors
    /// `ApiError::NetworkUnreachable` when the last selection found no
    /// healthy candidate, so callers fail fast instead of hanging.
    pub fn resolve_active(&self) -> ApiResult<Url> {
        let state = *self.state.read();
        if !state.available {
            return Err(ApiError::NetworkUnreachable(
                "no API endpoint is currently reachable".into(),
            ));
        }
        Ok(self.candidates[state.active].clone())
    }

    /// Probe the primary, then each backup in order, and commit to the first
    /// healthy one
    ///
    /// # Errors
    /// `ApiError::NetworkUnreachable` when no candidate is healthy; the
    /// resolver then reports itself unavailable.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> ApiResult<EndpointSelection> {
        let _probing = self.probing.lock().await;
        self.select().await
    }

    /// Rerun selection when the resolver is unavailable
    ///
    /// Returns the active endpoint untouched while it is available. Otherwise
    /// probes again unless the last round finished less than
    /// `recheck_interval` ago, in which case it fails fast.
    ///
    /// # Errors
    /// `ApiError::NetworkUnreachable` when the interval has not elapsed or the
    /// new round finds no healthy candidate.
    #[instrument(skip(self))]
    pub async fn recheck(&self) -> ApiResult<EndpointSelection> {
        let _probing = self.probing.lock().await;

        let state = *self.state.read();
        if state.available {
            let url = self.candidates[state.active].clone();
            return Ok(EndpointSelection { url, switched_from: None });
        }
        if state.selected_at.is_some_and(|at| at.elapsed() < self.recheck_interval) {
            return Err(ApiError::NetworkUnreachable(
                "no API endpoint is currently reachable".into(),
            ));
        }

        debug!("re-checking endpoints");
        self.select().await
    }

    /// Probe every candidate in order; caller holds `probing`
    async fn select(&self) -> ApiResult<EndpointSelection> {
        for index in 0..self.candidates.len() {
            if self.is_healthy(index).await {
                return Ok(self.commit(index));
            }
        }

        {
            let mut state = self.state.write();
            state.available = false;
            state.selected_at = Some(Instant::now());
        }
        warn!(candidates = self.candidates.len(), "no API endpoint passed its health check");
        Err(ApiError::NetworkUnreachable("no API endpoint passed its health check".into()))
    }

    /// Move away from `failed` to the first other healthy candidate
    ///
    /// If another task already switched away from `failed`, the current
    /// endpoint is returned without probing. When nothing else is healthy
    /// the current endpoint stays active.
    ///
    /// # Errors
    /// `ApiError::NetworkUnreachable` when no other candidate is healthy.
    #[instrument(skip(self), fields(failed = %failed))]
    pub async fn failover(&self, failed: &Url) -> ApiResult<EndpointSelection> {
        let _probing = self.probing.lock().await;

        let state = *self.state.read();
        let current = &self.candidates[state.active];
        if state.available && current != failed {
            return Ok(EndpointSelection { url: current.clone(), switched_from: None });
        }

        for index in 0..self.candidates.len() {
            if &self.candidates[index] == failed {
                continue;
            }
            if self.is_healthy(index).await {
                return Ok(self.commit(index));
            }
        }

        warn!("failover found no healthy alternative, keeping current endpoint");
        Err(ApiError::NetworkUnreachable("no alternative API endpoint is healthy".into()))
    }

    async fn is_healthy(&self, index: usize) -> bool {
        let base = &self.candidates[index];
        match endpoint_url(base, &self.health_path, &BTreeMap::new()) {
            Ok(url) => self.http.probe(url, self.health_timeout).await,
            Err(error) => {
                warn!(%base, error = %error, "cannot build health probe url");
                false
            }
        }
    }

    fn commit(&self, index: usize) -> EndpointSelection {
        let mut state = self.state.write();
        let previous = state.active;
        state.active = index;
        state.available = true;
        state.selected_at = Some(Instant::now());

        let url = self.candidates[index].clone();
        let switched_from = (previous != index).then(|| self.candidates[previous].clone());
        match &switched_from {
            Some(from) => info!(from = %from, to = %url, "switched API endpoint"),
            None => info!(endpoint = %url, "API endpoint healthy"),
        }
        EndpointSelection { url, switched_from }
    }
}

/// Join `path` and `query` onto `base`, keeping any path prefix of `base`
///
/// # Errors
/// `ApiError::Internal` when the result is not a valid URL.
pub fn endpoint_url(base: &Url, path: &str, query: &BTreeMap<String, String>) -> ApiResult<Url> {
    let base = base.as_str().trim_end_matches('/');
    let joined = format!("{base}/{}", path.trim_start_matches('/'));
    let mut url = Url::parse(&joined)
        .map_err(|e| ApiError::Internal(format!("invalid request url {joined}: {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn resolver(primary: String, backups: Vec<String>) -> EndpointResolver {
        resolver_with_recheck(primary, backups, Duration::from_secs(60))
    }

    fn resolver_with_recheck(
        primary: String,
        backups: Vec<String>,
        recheck_interval: Duration,
    ) -> EndpointResolver {
        let config = EndpointConfig {
            primary_url: primary,
            backup_urls: backups,
            health_timeout_ms: 500,
            recheck_interval_ms: u64::try_from(recheck_interval.as_millis()).unwrap(),
            ..Default::default()
        };
        EndpointResolver::new(HttpClient::new().unwrap(), &config).unwrap()
    }

    #[test]
    fn joins_paths_and_queries() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let query = BTreeMap::from([("page".to_string(), "2".to_string())]);
        let url = endpoint_url(&base, "/classes", &query).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/classes?page=2");
    }

    #[tokio::test]
    async fn healthy_primary_is_kept() {
        let primary = healthy_server().await;
        let resolver = resolver(primary.uri(), vec![dead_url()]);

        let selection = resolver.initialize().await.unwrap();

        assert!(!selection.switched());
        assert_eq!(resolver.resolve_active().unwrap(), Url::parse(&primary.uri()).unwrap());
    }

    #[tokio::test]
    async fn unhealthy_primary_switches_to_backup() {
        let backup = healthy_server().await;
        let primary = MockServer::start().await;
        Mock::given(path("/health")).respond_with(ResponseTemplate::new(503)).mount(&primary).await;
        let resolver = resolver(primary.uri(), vec![dead_url(), backup.uri()]);

        let selection = resolver.initialize().await.unwrap();

        assert_eq!(selection.url, Url::parse(&backup.uri()).unwrap());
        assert_eq!(selection.switched_from, Some(Url::parse(&primary.uri()).unwrap()));
    }

    #[tokio::test]
    async fn no_healthy_candidate_fails_fast() {
        let resolver = resolver(dead_url(), vec![dead_url()]);

        assert!(matches!(resolver.initialize().await, Err(ApiError::NetworkUnreachable(_))));
        assert!(matches!(resolver.resolve_active(), Err(ApiError::NetworkUnreachable(_))));
        assert!(!resolver.is_available());
    }

    #[tokio::test]
    async fn failover_skips_failed_endpoint_once() {
        let primary = healthy_server().await;
        let backup = healthy_server().await;
        let resolver = resolver(primary.uri(), vec![backup.uri()]);
        resolver.initialize().await.unwrap();
        let failed = resolver.resolve_active().unwrap();

        let first = resolver.failover(&failed).await.unwrap();
        assert_eq!(first.url, Url::parse(&backup.uri()).unwrap());
        assert!(first.switched());

        // a second task reporting the same failure does not switch again
        let second = resolver.failover(&failed).await.unwrap();
        assert_eq!(second.url, first.url);
        assert!(!second.switched());
    }

    #[tokio::test]
    async fn recheck_waits_for_interval_before_checking_again() {
        let primary = MockServer::start().await;
        Mock::given(path("/health")).respond_with(ResponseTemplate::new(503)).mount(&primary).await;
        let resolver = resolver(primary.uri(), Vec::new());
        assert!(resolver.initialize().await.is_err());

        assert!(matches!(resolver.recheck().await, Err(ApiError::NetworkUnreachable(_))));

        // only the initial round reached the server
        assert_eq!(primary.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recheck_recovers_once_endpoint_is_healthy() {
        let primary = MockServer::start().await;
        Mock::given(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&primary)
            .await;
        Mock::given(path("/health")).respond_with(ResponseTemplate::new(200)).mount(&primary).await;
        let resolver = resolver_with_recheck(primary.uri(), Vec::new(), Duration::ZERO);
        assert!(resolver.initialize().await.is_err());

        let selection = resolver.recheck().await.unwrap();

        assert!(!selection.switched());
        assert!(resolver.is_available());
        assert_eq!(resolver.resolve_active().unwrap(), Url::parse(&primary.uri()).unwrap());
    }

    #[tokio::test]
    async fn recheck_is_a_no_op_while_available() {
        let primary = healthy_server().await;
        let resolver = resolver_with_recheck(primary.uri(), Vec::new(), Duration::ZERO);

        let selection = resolver.recheck().await.unwrap();

        assert_eq!(selection.url, Url::parse(&primary.uri()).unwrap());
        assert!(primary.received_requests().await.unwrap().is_empty());
    }
}
