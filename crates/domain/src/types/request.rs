//! Request and response types
//!
//! A [`RequestEnvelope`] lives for exactly one logical call. Its
//! [`Fingerprint`] is derived from method, path, query and body only, so two
//! calls differing just in headers (for example a rotated bearer token)
//! share cache and dedup entries.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApiError;

/// HTTP verbs the client layer issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Safe read; the only cacheable method
    Get,
    /// Create; neither cached nor deduplicated
    Post,
    /// Full replace
    Put,
    /// Partial update
    Patch,
    /// Removal; never deduplicated
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Everything except GET changes server state
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }

    /// GET/PUT/PATCH are assumed idempotent and may share one round trip
    pub fn is_dedup_eligible(self) -> bool {
        matches!(self, Self::Get | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic request key (BLAKE3 over method, path, query and body)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a request
    ///
    /// Query parameters are hashed in key order and JSON bodies in their
    /// canonical (sorted-key) serialization.
    pub fn compute(
        method: HttpMethod,
        path: &str,
        query: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        for (key, value) in query {
            hash_framed(&mut hasher, key.as_bytes());
            hash_framed(&mut hasher, value.as_bytes());
        }
        hasher.update(b"\n");
        if let Some(body) = body {
            hash_canonical(&mut hasher, body);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for log fields
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

/// Length-prefixed so separators inside keys or values cannot collide
fn hash_framed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&u64::try_from(bytes.len()).unwrap_or(u64::MAX).to_le_bytes());
    hasher.update(bytes);
}

/// Rewrite `path` to the form the URL builder sends
///
/// Leading slashes collapse to one, empty and `.` segments are dropped and
/// `..` pops the previous segment. Anything after `?` is kept verbatim, so
/// replayed queue paths with an encoded query survive. Auth checks,
/// fingerprints and the outgoing URL all see the same path.
pub fn normalize_path(path: &str) -> String {
    let (route, query) = match path.split_once('?') {
        Some((route, query)) => (route, Some(query)),
        None => (path, None),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in route.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if route.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    if let Some(query) = query {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}

/// Feed `value` into the hasher with object keys in sorted order, independent
/// of whether serde_json preserves insertion order.
fn hash_canonical(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for key in keys {
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                if let Some(inner) = map.get(key) {
                    hash_canonical(hasher, inner);
                }
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_canonical(hasher, item);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        scalar => {
            hasher.update(scalar.to_string().as_bytes());
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// One outbound call
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    method: HttpMethod,
    path: String,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    headers: BTreeMap<String, String>,
    retry_count: u32,
    auth_retried: bool,
    fingerprint: Fingerprint,
}

impl RequestEnvelope {
    /// New envelope; `path` is normalized with [`normalize_path`]
    pub fn new(method: HttpMethod, path: impl AsRef<str>) -> Self {
        let path = normalize_path(path.as_ref());
        let query = BTreeMap::new();
        let fingerprint = Fingerprint::compute(method, &path, &query, None);
        Self {
            method,
            path,
            query,
            body: None,
            headers: BTreeMap::new(),
            retry_count: 0,
            auth_retried: false,
            fingerprint,
        }
    }

    pub fn get(path: impl AsRef<str>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self.refingerprint();
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.refingerprint();
        self
    }

    /// Serialize and attach a JSON body
    ///
    /// # Errors
    /// Returns `ApiError::Internal` if `body` cannot be represented as JSON.
    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Internal(format!("Failed to serialize body: {e}")))?;
        Ok(self.with_body(value))
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header; names are stored lower-cased
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(&name.to_ascii_lowercase());
    }

    /// Count one more retry of this envelope
    pub fn record_retry(&mut self) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_count
    }

    /// Mark that this envelope has been resubmitted after a token refresh
    pub fn mark_auth_retried(&mut self) {
        self.auth_retried = true;
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn auth_retried(&self) -> bool {
        self.auth_retried
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn refingerprint(&mut self) {
        self.fingerprint =
            Fingerprint::compute(self.method, &self.path, &self.query, self.body.as_ref());
    }
}

/// Snapshot of a settled HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the JSON body
    ///
    /// Empty bodies (204/205 or a blank 200) decode from `null`, so `()` and
    /// `Option<T>` targets work without a payload.
    ///
    /// # Errors
    /// Returns `ApiError::Decode` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_value(Value::Null).map_err(|_| {
                ApiError::Decode(format!(
                    "empty response body ({}) cannot be decoded into the requested type",
                    self.status
                ))
            });
        }
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fingerprint_ignores_headers_and_query_order() {
        let a = RequestEnvelope::get("/classes")
            .with_query("page", "2")
            .with_query("size", "10")
            .with_header("Authorization", "Bearer one");
        let b = RequestEnvelope::get("/classes")
            .with_query("size", "10")
            .with_query("page", "2")
            .with_header("Authorization", "Bearer two");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_method_path_and_body() {
        let get = RequestEnvelope::get("/packages");
        let other_path = RequestEnvelope::get("/packages/1");
        let put = RequestEnvelope::new(HttpMethod::Put, "/packages");
        assert_ne!(get.fingerprint(), other_path.fingerprint());
        assert_ne!(get.fingerprint(), put.fingerprint());

        let body_a = put.clone().with_body(json!({"seats": 1}));
        let body_b = put.with_body(json!({"seats": 2}));
        assert_ne!(body_a.fingerprint(), body_b.fingerprint());
    }

    #[test]
    fn test_fingerprint_body_key_order_is_canonical() {
        let a = RequestEnvelope::new(HttpMethod::Patch, "/me")
            .with_body(json!({"name": "x", "email": "y"}));
        let b: Value = serde_json::from_str(r#"{"email": "y", "name": "x"}"#).unwrap();
        let b = RequestEnvelope::new(HttpMethod::Patch, "/me").with_body(b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_query_separators_do_not_collide() {
        let a = RequestEnvelope::get("/search").with_query("a=b", "c");
        let b = RequestEnvelope::get("/search").with_query("a", "b=c");
        assert_ne!(a.fingerprint(), b.fingerprint());

        let c = RequestEnvelope::get("/search").with_query("a", "1&b=2");
        let d = RequestEnvelope::get("/search").with_query("a", "1").with_query("b", "2");
        assert_ne!(c.fingerprint(), d.fingerprint());
    }

    #[test]
    fn test_paths_are_normalized() {
        assert_eq!(normalize_path("auth/login"), "/auth/login");
        assert_eq!(normalize_path("//auth/login"), "/auth/login");
        assert_eq!(normalize_path("/classes/./7/../8"), "/classes/8");
        assert_eq!(normalize_path("/classes/"), "/classes/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("notes?draft=true&a=%2F"), "/notes?draft=true&a=%2F");
    }

    #[test]
    fn test_relative_path_shares_fingerprint_with_absolute() {
        let relative = RequestEnvelope::get("auth/me");
        let absolute = RequestEnvelope::get("/auth/me");
        assert_eq!(relative.path(), "/auth/me");
        assert_eq!(relative.fingerprint(), absolute.fingerprint());
    }

    #[test]
    fn test_method_eligibility() {
        assert!(HttpMethod::Get.is_dedup_eligible());
        assert!(HttpMethod::Put.is_dedup_eligible());
        assert!(HttpMethod::Patch.is_dedup_eligible());
        assert!(!HttpMethod::Post.is_dedup_eligible());
        assert!(!HttpMethod::Delete.is_dedup_eligible());
        assert!(!HttpMethod::Get.is_mutating());
        assert!(HttpMethod::Delete.is_mutating());
    }

    #[test]
    fn test_retry_bookkeeping() {
        let mut envelope = RequestEnvelope::get("/x");
        assert_eq!(envelope.record_retry(), 1);
        assert_eq!(envelope.record_retry(), 2);
        assert!(!envelope.auth_retried());
        envelope.mark_auth_retried();
        assert!(envelope.auth_retried());
    }

    #[test]
    fn test_empty_body_decodes_as_unit() {
        let response = ApiResponse::new(204, Vec::new());
        let decoded: Result<(), ApiError> = response.json();
        assert!(decoded.is_ok());

        let response = ApiResponse::new(204, Vec::new());
        let decoded: Result<Vec<u32>, ApiError> = response.json();
        assert!(matches!(decoded, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut response = ApiResponse::new(429, Vec::new());
        response.headers.insert("retry-after".to_string(), "3".to_string());
        assert_eq!(response.header("Retry-After"), Some("3"));
    }
}
