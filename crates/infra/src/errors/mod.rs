//! Error conversions for external crates

pub(crate) mod conversions;

pub use conversions::{http_status_error, IntoApiError};
