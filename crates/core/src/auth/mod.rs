//! Credential lifecycle: storage port, refresh port and the single-flight
//! refresh coordinator

pub mod coordinator;
pub mod ports;

pub use coordinator::TokenRefreshCoordinator;
