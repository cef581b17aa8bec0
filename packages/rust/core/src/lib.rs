//! Core row-validation pipeline for prospectclean.
//!
//! This crate ties together field validation, row reconciliation, bounded
//! concurrency, and batched persistence into the end-to-end cleaning run.

pub mod persister;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod scheduler;

pub use persister::{BatchPersister, MemorySink};
pub use pipeline::{CleanConfig, ProgressReporter, SilentProgress, clean_prospects, clean_rows};
pub use reconciler::{FieldVerdicts, OutputLayout, RowReconciler};
pub use report::{RunReport, SampleCorrection};
pub use scheduler::RowScheduler;
