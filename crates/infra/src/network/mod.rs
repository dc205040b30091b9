//! Connectivity signal implementation

mod monitor;

pub use monitor::WatchNetworkMonitor;
