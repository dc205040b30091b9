use std::fmt;

use tracing::trace;

/// Steps a request passes through, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ResolveEndpoint,
    AttachCredentials,
    Fingerprint,
    OfflineGate,
    CacheLookup,
    Deduplicate,
    Dispatch,
    Recover,
    Settle,
}

impl Stage {
    pub const ORDER: [Stage; 9] = [
        Stage::ResolveEndpoint,
        Stage::AttachCredentials,
        Stage::Fingerprint,
        Stage::OfflineGate,
        Stage::CacheLookup,
        Stage::Deduplicate,
        Stage::Dispatch,
        Stage::Recover,
        Stage::Settle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolveEndpoint => "resolve_endpoint",
            Self::AttachCredentials => "attach_credentials",
            Self::Fingerprint => "fingerprint",
            Self::OfflineGate => "offline_gate",
            Self::CacheLookup => "cache_lookup",
            Self::Deduplicate => "deduplicate",
            Self::Dispatch => "dispatch",
            Self::Recover => "recover",
            Self::Settle => "settle",
        }
    }

    pub(crate) fn enter(self) {
        trace!(stage = self.as_str(), "pipeline stage");
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
