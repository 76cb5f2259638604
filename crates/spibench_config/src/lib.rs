//! Parsing and validation of `spibench.toml` bench files.
//!
//! This crate reads the bench file and produces a strongly-typed
//! [`BenchConfig`], then expands its `[[scenario]]` entries into runnable
//! [`Scenario`](spibench_bitbang::Scenario)s with bench-wide defaults applied.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config, CONFIG_FILE};
pub use resolve::{resolve_bench, waveform_path, ResolvedBench};
pub use types::*;
