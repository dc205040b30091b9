//! Port interface for the connectivity signal

use steadfast_domain::ConnectivityState;
use tokio::sync::watch;

/// Source of connectivity transitions
pub trait NetworkMonitor: Send + Sync {
    /// Latest known state
    fn current(&self) -> ConnectivityState;

    /// Receiver that observes every subsequent state change
    fn subscribe(&self) -> watch::Receiver<ConnectivityState>;

    fn is_online(&self) -> bool {
        self.current().connected
    }
}
