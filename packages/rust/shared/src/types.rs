//! Core domain types for prospect cleaning runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one cleaning run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ProspectRow
// ---------------------------------------------------------------------------

/// One input record: ordered column/value pairs plus its original position.
///
/// The index preserves output ordering despite concurrent, out-of-order row
/// completion. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectRow {
    /// Zero-based position in the input table.
    pub index: usize,
    /// Column/value pairs in input header order.
    pub fields: Vec<(String, String)>,
}

impl ProspectRow {
    /// Look up a cell by column name.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

// ---------------------------------------------------------------------------
// FieldVerdict
// ---------------------------------------------------------------------------

/// Which rule or service path produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// The original value was accepted as-is.
    Accepted,
    /// The service returned a different value.
    Corrected,
    /// The service could not be reached or its response was unusable.
    Unresolved,
    /// Empty input, no service call was made.
    Skipped,
}

impl VerdictSource {
    /// Stable token used in logs and summary strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Corrected => "corrected",
            Self::Unresolved => "unresolved",
            Self::Skipped => "skipped",
        }
    }
}

/// The validation outcome for a single field.
///
/// The corrected value and confidence always travel together; a verdict is
/// never split across output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdict {
    /// Corrected value (may equal the original).
    pub corrected_value: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Free-text rationale.
    pub explanation: String,
    /// Which path produced this verdict.
    pub source_label: VerdictSource,
    /// Supporting citation URLs (company field only, empty otherwise).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
}

impl FieldVerdict {
    /// Verdict for an empty input value: nothing to validate.
    pub fn skipped(value: impl Into<String>) -> Self {
        Self {
            corrected_value: value.into(),
            confidence: 0.0,
            explanation: String::new(),
            source_label: VerdictSource::Skipped,
            citations: Vec::new(),
        }
    }

    /// Degraded verdict: the original value is kept, confidence zeroed,
    /// and the failure described in the explanation.
    pub fn unresolved(value: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            corrected_value: value.into(),
            confidence: 0.0,
            explanation: explanation.into(),
            source_label: VerdictSource::Unresolved,
            citations: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputRecord
// ---------------------------------------------------------------------------

/// One reconciled output row: cell values aligned to the run's output header.
///
/// Built exactly once per row and never mutated afterward; owned by the
/// persister once handed off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Input row index this record was derived from.
    pub index: usize,
    /// Values in output header order.
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// RecordSink
// ---------------------------------------------------------------------------

/// Destination boundary for flushed batches of output records.
///
/// Implementations must not corrupt previously appended data when a write
/// fails; a failed call may be retried with the same batch.
pub trait RecordSink {
    /// Append one flushed batch. Records within a batch arrive sorted by
    /// input index.
    fn append_batch(&mut self, records: &[OutputRecord]) -> Result<()>;
}
