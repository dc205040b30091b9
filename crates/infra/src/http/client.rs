use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method};
use serde_json::Value;
use steadfast_domain::{ApiError, ApiResponse, HttpMethod};
use tracing::debug;
use url::Url;

use crate::errors::conversions::transport_error;
use crate::errors::IntoApiError;

/// HTTP client performing exactly one attempt per call
///
/// Retries, refreshes and failover live in the request pipeline; this type
/// only turns a request into an [`ApiResponse`] or a transport error.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one request and buffer the response
    ///
    /// Any status, including 4xx/5xx, is returned as `Ok`; only transport
    /// failures (no response) are errors.
    pub async fn execute(
        &self,
        method: HttpMethod,
        url: Url,
        headers: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let mut builder = self.client.request(to_reqwest(method), url.clone());
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, %url, "sending HTTP request");
        let response =
            builder.send().await.map_err(|err| transport_error(err, self.timeout))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|err| transport_error(err, self.timeout))?;
        debug!(%method, %url, status, "received HTTP response");

        Ok(ApiResponse { status, headers, body: body.to_vec() })
    }

    /// Health probe: GET `url` within `timeout`, healthy on any 2xx
    pub async fn probe(&self, url: Url, timeout: Duration) -> bool {
        let outcome = self.client.get(url.clone()).timeout(timeout).send().await;
        match outcome {
            Ok(response) => {
                let healthy = response.status().is_success();
                debug!(%url, status = response.status().as_u16(), healthy, "health probe");
                healthy
            }
            Err(err) => {
                debug!(%url, error = %err.into_api_error(), "health probe failed");
                false
            }
        }
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None, default_headers: None }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, ApiError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| ApiError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
