//! Error types for prospectclean.
//!
//! Library crates use [`ProspectCleanError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all prospectclean operations.
#[derive(Debug, thiserror::Error)]
pub enum ProspectCleanError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input table unreadable: missing file, undecodable bytes, or a
    /// configured column absent from the header. Fatal at startup.
    #[error("source error: {0}")]
    Source(String),

    /// Reasoning service unreachable, timed out, or returned a payload
    /// that failed strict decoding. Recovered locally into a degraded
    /// verdict at the validator boundary, never propagated past it.
    #[error("validation unavailable: {0}")]
    Validation(String),

    /// Unexpected failure while merging verdicts into an output record.
    /// Recovered per row into a degraded record.
    #[error("reconciliation error: {message}")]
    Reconciliation { message: String },

    /// Destination write failure. Fatal to the current flush; the
    /// unflushed batch is retained for retry.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProspectCleanError>;

impl ProspectCleanError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a reconciliation error from any displayable message.
    pub fn reconciliation(msg: impl Into<String>) -> Self {
        Self::Reconciliation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProspectCleanError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ProspectCleanError::Source("column 'nom' not found".into());
        assert!(err.to_string().contains("column 'nom' not found"));

        let err = ProspectCleanError::Persistence("disk full".into());
        assert_eq!(err.to_string(), "persistence error: disk full");
    }
}
