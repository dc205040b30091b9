//! Token refresh over HTTP

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use steadfast_core::{RefreshFailure, TokenRefresher};
use steadfast_domain::constants::RETRY_AFTER_HEADER;
use steadfast_domain::{ApiError, HttpMethod, RefreshRequest, TokenPair};
use tracing::{debug, warn};

use super::endpoint::{endpoint_url, EndpointResolver};
use crate::errors::conversions::parse_retry_after;
use crate::errors::http_status_error;
use crate::http::HttpClient;

/// Exchanges a refresh token at `POST <active base><refresh_path>`
///
/// The call bypasses the pipeline: it is never cached, deduplicated, retried
/// or refreshed itself.
pub struct HttpTokenRefresher {
    http: HttpClient,
    resolver: Arc<EndpointResolver>,
    refresh_path: String,
}

impl HttpTokenRefresher {
    /// Refresher that POSTs to `refresh_path` on the active endpoint
    pub fn new(
        http: HttpClient,
        resolver: Arc<EndpointResolver>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self { http, resolver, refresh_path: refresh_path.into() }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshFailure> {
        let base = self.resolver.resolve_active().map_err(RefreshFailure::Unavailable)?;
        let url = endpoint_url(&base, &self.refresh_path, &BTreeMap::new())
            .map_err(RefreshFailure::Unavailable)?;
        let body = serde_json::to_value(RefreshRequest { refresh_token: refresh_token.to_string() })
            .map_err(|e| RefreshFailure::Unavailable(ApiError::Internal(e.to_string())))?;

        debug!(%url, "refreshing access token");
        let response = self
            .http
            .execute(HttpMethod::Post, url, &BTreeMap::new(), Some(&body))
            .await
            .map_err(RefreshFailure::Unavailable)?;

        match response.status {
            401 | 403 => {
                warn!(status = response.status, "refresh token rejected");
                Err(RefreshFailure::Rejected(response.status))
            }
            _ if response.is_success() => {
                response.json::<TokenPair>().map_err(RefreshFailure::Unavailable)
            }
            status => {
                let retry_after = response.header(RETRY_AFTER_HEADER).and_then(parse_retry_after);
                let error = http_status_error(status, response.text(), retry_after);
                Err(RefreshFailure::Unavailable(error))
            }
        }
    }
}
