//! # Steadfast Domain
//!
//! Data types and error taxonomy for the Steadfast API client layer.
//!
//! This crate contains:
//! - Request/response types (`RequestEnvelope`, `Fingerprint`, `ApiResponse`)
//! - Credential, offline queue and connectivity types
//! - The client-facing error taxonomy (`ApiError`)
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other Steadfast crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
