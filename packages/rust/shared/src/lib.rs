//! Shared types, error model, and configuration for prospectclean.
//!
//! This crate is the foundation depended on by all other prospectclean crates.
//! It provides:
//! - [`ProspectCleanError`] — the unified error type
//! - Domain types ([`ProspectRow`], [`FieldVerdict`], [`OutputRecord`], [`RunId`])
//! - The [`RecordSink`] destination boundary
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColumnsConfig, DefaultsConfig, OpenAiConfig, RunConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{ProspectCleanError, Result};
pub use types::{FieldVerdict, OutputRecord, ProspectRow, RecordSink, RunId, VerdictSource};
