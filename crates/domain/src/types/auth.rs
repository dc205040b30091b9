//! Credential types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access + refresh credential pair, as returned by the refresh endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body POSTed to the refresh path
#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest").field("refresh_token", &"<redacted>").finish()
    }
}

/// Session lifecycle notifications for UI-layer subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Both tokens were rotated by a successful refresh
    Refreshed,
    /// The refresh credential was rejected; the user must log in again
    Expired { reason: String },
    /// Failover moved traffic to another backend and credentials were dropped
    EndpointChanged { from: String, to: String },
    /// Explicit logout
    LoggedOut,
}
