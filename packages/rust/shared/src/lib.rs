//! Shared types, error model, and configuration for sdgtool.
//!
//! This crate is the foundation depended on by all other sdgtool crates.
//! It provides:
//! - [`SdgError`], the unified error type
//! - Domain types ([`Record`], [`RecordSeq`], [`FailureRecord`])
//! - Configuration ([`AppConfig`], [`GeocodingConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GeocodingConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_geocoding,
};
pub use error::{Result, SdgError};
pub use types::{FailureReason, FailureRecord, Record, RecordSeq, UNKNOWN_NAME, columns, value_to_text};
