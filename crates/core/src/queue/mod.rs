//! Offline queue port and drain procedure

mod drain;
pub mod ports;

pub use drain::drain_queue;
