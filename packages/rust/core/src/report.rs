//! Run summary derived from reconciled records.

use std::time::Duration;

use chrono::{DateTime, Utc};

use prospectclean_shared::{OutputRecord, RunId};

use crate::reconciler::OutputLayout;

/// How many example corrections to keep per field.
const SAMPLES_PER_FIELD: usize = 3;

/// One example correction shown in the run summary.
#[derive(Debug, Clone)]
pub struct SampleCorrection {
    pub field: &'static str,
    pub original: String,
    pub corrected: String,
    pub confidence: f64,
}

/// Summary of a completed cleaning run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub rows_total: usize,
    pub rows_processed: usize,
    pub corrections_last_name: usize,
    pub corrections_first_name: usize,
    pub corrections_company: usize,
    pub unresolved_fields: usize,
    pub mean_confidence_last_name: f64,
    pub mean_confidence_first_name: f64,
    pub mean_confidence_company: f64,
    pub samples: Vec<SampleCorrection>,
}

/// Streaming accumulator fed one record at a time as rows complete.
pub(crate) struct ReportAccumulator {
    positions: ColumnPositions,
    processed: usize,
    corrections: [usize; 3],
    confidence_sums: [f64; 3],
    unresolved: usize,
    samples: Vec<SampleCorrection>,
}

struct ColumnPositions {
    originals: [usize; 3],
    validated: [usize; 3],
    confidences: [usize; 3],
    source_validation: usize,
}

const FIELD_TOKENS: [&str; 3] = ["lastname", "firstname", "company"];

impl ReportAccumulator {
    pub fn new(layout: &OutputLayout) -> Self {
        let pos = |column: &str| {
            layout
                .position(column)
                .expect("derived column present in layout")
        };
        let columns = layout.columns();

        let positions = ColumnPositions {
            originals: [
                pos(&columns.last_name),
                pos(&columns.first_name),
                pos(&columns.company),
            ],
            validated: [
                pos(&format!("{}_valide", columns.last_name)),
                pos(&format!("{}_valide", columns.first_name)),
                pos(&format!("{}_validee", columns.company)),
            ],
            confidences: [
                pos("confiance_nom"),
                pos("confiance_prenom"),
                pos("confiance_entreprise"),
            ],
            source_validation: pos("source_validation"),
        };

        Self {
            positions,
            processed: 0,
            corrections: [0; 3],
            confidence_sums: [0.0; 3],
            unresolved: 0,
            samples: Vec::new(),
        }
    }

    pub fn add(&mut self, record: &OutputRecord) {
        self.processed += 1;

        for field in 0..3 {
            let original = &record.values[self.positions.originals[field]];
            let validated = &record.values[self.positions.validated[field]];
            let confidence = record.values[self.positions.confidences[field]]
                .parse::<f64>()
                .unwrap_or(0.0);

            self.confidence_sums[field] += confidence;

            if original != validated {
                self.corrections[field] += 1;
                let taken = self
                    .samples
                    .iter()
                    .filter(|s| s.field == FIELD_TOKENS[field])
                    .count();
                if taken < SAMPLES_PER_FIELD {
                    self.samples.push(SampleCorrection {
                        field: FIELD_TOKENS[field],
                        original: original.clone(),
                        corrected: validated.clone(),
                        confidence,
                    });
                }
            }
        }

        self.unresolved += record.values[self.positions.source_validation]
            .matches("unresolved")
            .count();
    }

    pub fn finish(
        self,
        run_id: RunId,
        started_at: DateTime<Utc>,
        rows_total: usize,
        elapsed: Duration,
    ) -> RunReport {
        let mean = |sum: f64| {
            if self.processed > 0 {
                sum / self.processed as f64
            } else {
                0.0
            }
        };

        RunReport {
            run_id,
            started_at,
            elapsed,
            rows_total,
            rows_processed: self.processed,
            corrections_last_name: self.corrections[0],
            corrections_first_name: self.corrections[1],
            corrections_company: self.corrections[2],
            unresolved_fields: self.unresolved,
            mean_confidence_last_name: mean(self.confidence_sums[0]),
            mean_confidence_first_name: mean(self.confidence_sums[1]),
            mean_confidence_company: mean(self.confidence_sums[2]),
            samples: self.samples,
        }
    }
}
