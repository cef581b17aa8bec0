//! Pure merge of one row and its field verdicts into an output record.
//!
//! Reconciliation is deliberately separated from validation: validation is
//! I/O-bound and fallible, reconciliation is a pure function testable
//! without network access.

use prospectclean_shared::{
    ColumnsConfig, FieldVerdict, OutputRecord, ProspectCleanError, ProspectRow, Result,
    VerdictSource,
};

/// Derived column names appended after the validated-value columns.
const DERIVED_COLUMNS: [&str; 7] = [
    "confiance_nom",
    "confiance_prenom",
    "confiance_entreprise",
    "entreprise_citations",
    "entreprise_explication",
    "name_explication",
    "source_validation",
];

/// Verdicts for the three validated fields of one row.
///
/// Each output record is built from exactly one `FieldVerdicts` instance,
/// so a field's corrected value and confidence always come from the same
/// verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVerdicts {
    pub last_name: FieldVerdict,
    pub first_name: FieldVerdict,
    pub company: FieldVerdict,
}

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

/// The output header: all input columns followed by validated and derived
/// columns.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    input_header: Vec<String>,
    header: Vec<String>,
    columns: ColumnsConfig,
}

impl OutputLayout {
    pub fn new(input_header: Vec<String>, columns: ColumnsConfig) -> Self {
        let mut header = input_header.clone();
        header.push(format!("{}_valide", columns.last_name));
        header.push(format!("{}_valide", columns.first_name));
        header.push(format!("{}_validee", columns.company));
        header.extend(DERIVED_COLUMNS.iter().map(|c| c.to_string()));

        Self {
            input_header,
            header,
            columns,
        }
    }

    /// Full output header in column order.
    pub fn header(&self) -> Vec<String> {
        self.header.clone()
    }

    /// Position of a column in the output header.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|c| c == column)
    }

    /// Input column configuration this layout was built from.
    pub fn columns(&self) -> &ColumnsConfig {
        &self.columns
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Merges rows and verdicts into output records. Never talks to the
/// reasoning service.
#[derive(Debug, Clone)]
pub struct RowReconciler {
    layout: OutputLayout,
}

impl RowReconciler {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Build the output record for `row`. Deterministic, pure function of
    /// its inputs.
    pub fn reconcile(&self, row: &ProspectRow, verdicts: &FieldVerdicts) -> Result<OutputRecord> {
        for column in &self.layout.input_header {
            if row.get(column).is_none() {
                return Err(ProspectCleanError::reconciliation(format!(
                    "row {} has no value for column '{column}'",
                    row.index
                )));
            }
        }
        Ok(self.assemble(row, verdicts))
    }

    /// Build a stand-in record for a row whose processing failed: original
    /// values kept, every field unresolved at confidence zero. Infallible.
    pub fn degraded(&self, row: &ProspectRow, error: &ProspectCleanError) -> OutputRecord {
        let original = |column: &str| row.get(column).unwrap_or("").to_string();
        let columns = &self.layout.columns;
        let verdicts = FieldVerdicts {
            last_name: FieldVerdict::unresolved(original(&columns.last_name), error.to_string()),
            first_name: FieldVerdict::unresolved(original(&columns.first_name), error.to_string()),
            company: FieldVerdict::unresolved(original(&columns.company), error.to_string()),
        };
        self.assemble(row, &verdicts)
    }

    fn assemble(&self, row: &ProspectRow, verdicts: &FieldVerdicts) -> OutputRecord {
        let mut values: Vec<String> = Vec::with_capacity(self.layout.header.len());
        for column in &self.layout.input_header {
            values.push(row.get(column).unwrap_or("").to_string());
        }

        values.push(verdicts.last_name.corrected_value.clone());
        values.push(verdicts.first_name.corrected_value.clone());
        values.push(verdicts.company.corrected_value.clone());

        values.push(format_confidence(verdicts.last_name.confidence));
        values.push(format_confidence(verdicts.first_name.confidence));
        values.push(format_confidence(verdicts.company.confidence));

        values.push(verdicts.company.citations.join(";"));
        values.push(verdicts.company.explanation.clone());
        values.push(name_explanation(verdicts));
        values.push(source_validation(verdicts));

        OutputRecord {
            index: row.index,
            values,
        }
    }
}

/// Canonical `field:status` summary, in lastname/firstname/company order.
fn source_validation(verdicts: &FieldVerdicts) -> String {
    format!(
        "lastname:{};firstname:{};company:{}",
        status(&verdicts.last_name),
        status(&verdicts.first_name),
        status(&verdicts.company)
    )
}

/// Status token for one verdict. Resolved-but-doubtful fields are flagged
/// distinctly so downstream consumers can filter by quality.
fn status(verdict: &FieldVerdict) -> &'static str {
    match verdict.source_label {
        VerdictSource::Unresolved => "unresolved",
        VerdictSource::Skipped => "skipped",
        VerdictSource::Accepted | VerdictSource::Corrected if verdict.confidence < 0.5 => {
            "low_confidence"
        }
        VerdictSource::Accepted => "ok",
        VerdictSource::Corrected => "corrected",
    }
}

fn name_explanation(verdicts: &FieldVerdicts) -> String {
    let mut parts = Vec::new();
    for verdict in [&verdicts.last_name, &verdicts.first_name] {
        if !verdict.explanation.is_empty() {
            parts.push(verdict.explanation.as_str());
        }
    }
    parts.join("; ")
}

fn format_confidence(confidence: f64) -> String {
    format!("{confidence:.2}")
}
