//! Connectivity signal port

pub mod ports;
