//! Configuration loading
//!
//! Builds a [`ClientConfig`](steadfast_domain::ClientConfig) from
//! environment variables or a TOML/JSON file.

pub mod loader;

pub use loader::{
    load, load_from_env, load_from_file, load_from_str, probe_config_paths, ConfigFormat,
};
