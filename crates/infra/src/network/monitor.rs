use steadfast_core::NetworkMonitor;
use steadfast_domain::ConnectivityState;
use tokio::sync::watch;
use tracing::info;

/// Connectivity signal fed by the host platform
///
/// The embedding application calls [`set_state`](Self::set_state) whenever
/// the OS reports a change; subscribers only see actual transitions.
#[derive(Debug)]
pub struct WatchNetworkMonitor {
    sender: watch::Sender<ConnectivityState>,
}

impl Default for WatchNetworkMonitor {
    fn default() -> Self {
        Self::new(ConnectivityState::default())
    }
}

impl WatchNetworkMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Publish a new state; returns whether it differed from the last one
    pub fn set_state(&self, state: ConnectivityState) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            info!(
                connected = state.connected,
                kind = ?state.connection_type,
                "connectivity changed"
            );
        }
        changed
    }
}

impl NetworkMonitor for WatchNetworkMonitor {
    fn current(&self) -> ConnectivityState {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.sender.subscribe()
    }
}
