//! Connectivity signal types

use serde::{Deserialize, Serialize};

/// Transport the device is currently using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Unknown,
    None,
}

/// Connectivity transition emitted by the network monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub connected: bool,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
}

impl ConnectivityState {
    pub const fn online(connection_type: ConnectionType) -> Self {
        Self { connected: true, connection_type }
    }

    pub const fn offline() -> Self {
        Self { connected: false, connection_type: ConnectionType::None }
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::online(ConnectionType::Unknown)
    }
}
