//! Client-level counters

pub mod client;

pub use client::{ClientMetrics, ClientMetricsSnapshot};
