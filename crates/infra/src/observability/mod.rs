//! Observability: tracing subscriber setup and client counters
//!
//! Library code only emits `tracing` events; the embedding application
//! decides where they go by calling [`init_tracing`] once at startup.
//! Access and refresh tokens never appear in events.

pub mod metrics;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use metrics::{ClientMetrics, ClientMetricsSnapshot};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "steadfast=info";

/// Output format for [`init_tracing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable, for terminals
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

/// Install the global tracing subscriber
///
/// Returns `false` when a subscriber was already installed; calling this
/// twice is harmless.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    };
    installed.is_ok()
}
