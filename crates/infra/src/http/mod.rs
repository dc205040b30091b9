//! Thin reqwest wrapper used for every outbound call

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
