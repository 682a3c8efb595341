//! Parsing and validation of `lattice.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`CompilerConfig`] with output-target resolution and worker-pool settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::*;
