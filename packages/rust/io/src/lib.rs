//! Flat-file table boundaries for prospectclean.
//!
//! This crate provides:
//! - [`source`] — reads an input CSV into ordered [`ProspectRow`]s
//! - [`sink`] — the [`CsvSink`] destination writer, which keeps the output
//!   file strictly input-ordered across incremental batch flushes
//!
//! [`ProspectRow`]: prospectclean_shared::ProspectRow

pub mod sink;
pub mod source;

pub use sink::CsvSink;
pub use source::{CsvTable, read_table};
