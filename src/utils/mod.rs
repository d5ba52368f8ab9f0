//! Configuration utilities.

/// `kbase.toml` parsing, validation and hot reloading.
pub mod toml_config;
