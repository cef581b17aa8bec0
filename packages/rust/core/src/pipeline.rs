//! End-to-end cleaning run: read -> validate -> reconcile -> persist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use prospectclean_io::{CsvSink, read_table};
use prospectclean_shared::{
    ColumnsConfig, OutputRecord, ProspectCleanError, ProspectRow, RecordSink, Result, RunConfig,
    RunId,
};
use prospectclean_validator::{
    FieldKind, FieldValidator, ReasoningService, ValidationContext,
};

use crate::persister::BatchPersister;
use crate::reconciler::{FieldVerdicts, OutputLayout, RowReconciler};
use crate::report::{ReportAccumulator, RunReport};
use crate::scheduler::RowScheduler;

/// Per-call deadline for one field validation; exceeding it degrades the
/// field the same way a service failure does.
const FIELD_CALL_TIMEOUT: Duration = Duration::from_secs(45);

/// Configuration for one cleaning run.
#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Input CSV path.
    pub input: PathBuf,
    /// Output CSV path.
    pub output: PathBuf,
    /// Runtime knobs (concurrency, batch size, column names).
    pub run: RunConfig,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each row completes.
    fn row_completed(&self, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn row_completed(&self, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline entry points
// ---------------------------------------------------------------------------

/// Run the full cleaning pipeline against CSV files.
///
/// Reads every input row, validates and reconciles them under the
/// configured concurrency bound, and persists batches incrementally to the
/// output file so partial progress survives a mid-run failure.
#[instrument(skip_all, fields(input = %config.input.display(), output = %config.output.display()))]
pub async fn clean_prospects<S>(
    config: &CleanConfig,
    service: S,
    progress: &dyn ProgressReporter,
) -> Result<RunReport>
where
    S: ReasoningService + 'static,
{
    progress.phase("Reading input");
    let table = read_table(&config.input, &config.run.columns)?;

    let layout = OutputLayout::new(table.header, config.run.columns.clone());
    let sink = CsvSink::create(&config.output, layout.header())?;

    let (report, _sink) =
        clean_rows(table.rows, layout, service, sink, &config.run, progress).await?;
    Ok(report)
}

/// Drive the scheduler over already-read rows, persisting into `sink`.
///
/// Split out from [`clean_prospects`] so the pipeline can run against any
/// [`RecordSink`]; returns the sink alongside the report.
pub async fn clean_rows<S, K>(
    rows: Vec<ProspectRow>,
    layout: OutputLayout,
    service: S,
    sink: K,
    run: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<(RunReport, K)>
where
    S: ReasoningService + 'static,
    K: RecordSink + Send,
{
    let start = Instant::now();
    let started_at = chrono::Utc::now();
    let run_id = RunId::new();
    let total = rows.len();

    info!(%run_id, rows = total, max_concurrency = run.max_concurrency, batch_size = run.batch_size, "starting cleaning run");

    let reconciler = Arc::new(RowReconciler::new(layout));
    let validator = Arc::new(FieldValidator::new(service, FIELD_CALL_TIMEOUT));

    let mut accumulator = ReportAccumulator::new(reconciler.layout());
    let mut persister = BatchPersister::new(sink, run.batch_size);

    progress.phase("Validating rows");
    let scheduler = RowScheduler::new(run.max_concurrency);

    let work = {
        let validator = validator.clone();
        let reconciler = reconciler.clone();
        let columns = run.columns.clone();
        move |row: ProspectRow| {
            let validator = validator.clone();
            let reconciler = reconciler.clone();
            let columns = columns.clone();
            async move { process_row(row, validator, reconciler, columns).await }
        }
    };
    let degrade = {
        let reconciler = reconciler.clone();
        move |row: &ProspectRow, e: &ProspectCleanError| reconciler.degraded(row, e)
    };

    let mut rx = scheduler.run(rows, work, degrade);

    let mut completed = 0usize;
    while let Some(record) = rx.recv().await {
        completed += 1;
        progress.row_completed(completed, total);
        accumulator.add(&record);
        // A fatal persistence error drops the receiver and halts intake
        append_with_retry(&mut persister, record)?;
    }

    progress.phase("Flushing remainder");
    flush_with_retry(&mut persister)?;

    let report = accumulator.finish(run_id, started_at, total, start.elapsed());
    progress.done(&report);

    info!(
        rows_processed = report.rows_processed,
        corrections_company = report.corrections_company,
        unresolved_fields = report.unresolved_fields,
        elapsed_ms = report.elapsed.as_millis(),
        "cleaning run complete"
    );

    Ok((report, persister.into_sink()))
}

// ---------------------------------------------------------------------------
// Per-row work
// ---------------------------------------------------------------------------

/// Validate the three configured fields of one row, then reconcile.
async fn process_row<S: ReasoningService>(
    row: ProspectRow,
    validator: Arc<FieldValidator<S>>,
    reconciler: Arc<RowReconciler>,
    columns: ColumnsConfig,
) -> Result<OutputRecord> {
    let email = row.get(&columns.email).unwrap_or("");
    let email_domain = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_default();

    let last_raw = row.get(&columns.last_name).unwrap_or("").to_string();
    let first_raw = row.get(&columns.first_name).unwrap_or("").to_string();
    let company_raw = row.get(&columns.company).unwrap_or("").to_string();

    let last_name = validator
        .validate(
            FieldKind::LastName,
            &last_raw,
            &ValidationContext {
                email_domain: email_domain.clone(),
                companion_name: Some(first_raw.clone()),
            },
        )
        .await;

    let first_name = validator
        .validate(
            FieldKind::FirstName,
            &first_raw,
            &ValidationContext {
                email_domain: email_domain.clone(),
                companion_name: Some(last_raw.clone()),
            },
        )
        .await;

    let company = validator
        .validate(
            FieldKind::Company,
            &company_raw,
            &ValidationContext {
                email_domain,
                companion_name: None,
            },
        )
        .await;

    reconciler.reconcile(
        &row,
        &FieldVerdicts {
            last_name,
            first_name,
            company,
        },
    )
}

// ---------------------------------------------------------------------------
// Flush retry policy
// ---------------------------------------------------------------------------

/// Append a record; on a flush failure, retry the same batch once before
/// giving up. The failed batch stays in memory either way.
fn append_with_retry<K: RecordSink>(
    persister: &mut BatchPersister<K>,
    record: OutputRecord,
) -> Result<()> {
    if let Err(first) = persister.append(record) {
        warn!(error = %first, pending = persister.pending_len(), "flush failed, retrying once");
        persister.flush()?;
    }
    Ok(())
}

fn flush_with_retry<K: RecordSink>(persister: &mut BatchPersister<K>) -> Result<()> {
    if let Err(first) = persister.flush_remainder() {
        warn!(error = %first, pending = persister.pending_len(), "final flush failed, retrying once");
        persister.flush_remainder()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persister::MemorySink;
    use prospectclean_validator::{ServiceRequest, ServiceVerdict};

    /// Accepts every value as-is with full confidence.
    struct EchoService;

    impl ReasoningService for EchoService {
        fn assess(
            &self,
            request: &ServiceRequest,
        ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send {
            let value = request.value.clone();
            async move {
                Ok(ServiceVerdict {
                    corrected_value: value,
                    confidence: 1.0,
                    explanation: String::new(),
                    known_entity: true,
                    citations: vec![],
                })
            }
        }
    }

    /// Like [`EchoService`], but fails company lookups for one value.
    struct FailCompanyService {
        fail_value: &'static str,
    }

    impl ReasoningService for FailCompanyService {
        fn assess(
            &self,
            request: &ServiceRequest,
        ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send {
            let fails =
                request.field == FieldKind::Company && request.value == self.fail_value;
            let value = request.value.clone();
            async move {
                if fails {
                    Err(ProspectCleanError::Validation("service unreachable".into()))
                } else {
                    Ok(ServiceVerdict {
                        corrected_value: value,
                        confidence: 1.0,
                        explanation: String::new(),
                        known_entity: true,
                        citations: vec![],
                    })
                }
            }
        }
    }

    fn input_header() -> Vec<String> {
        vec![
            "nom".into(),
            "prenom".into(),
            "raison_sociale".into(),
            "email".into(),
        ]
    }

    fn rows(n: usize) -> Vec<ProspectRow> {
        (0..n)
            .map(|index| ProspectRow {
                index,
                fields: vec![
                    ("nom".into(), format!("Nom{index}")),
                    ("prenom".into(), format!("Prenom{index}")),
                    ("raison_sociale".into(), format!("Societe{index}")),
                    ("email".into(), format!("p{index}@societe{index}.fr")),
                ],
            })
            .collect()
    }

    fn run_config(max_concurrency: usize, batch_size: usize) -> RunConfig {
        RunConfig {
            max_concurrency,
            batch_size,
            columns: ColumnsConfig::default(),
        }
    }

    fn layout() -> OutputLayout {
        OutputLayout::new(input_header(), ColumnsConfig::default())
    }

    #[tokio::test]
    async fn twelve_rows_flush_as_ten_then_two_with_no_unresolved() {
        let (report, sink) = clean_rows(
            rows(12),
            layout(),
            EchoService,
            MemorySink::default(),
            &run_config(3, 10),
            &SilentProgress,
        )
        .await
        .unwrap();

        let sizes: Vec<usize> = sink.flushes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 2]);
        assert_eq!(report.rows_processed, 12);
        assert_eq!(report.unresolved_fields, 0);

        let source_pos = layout().position("source_validation").unwrap();
        for record in sink.records() {
            assert!(!record.values[source_pos].contains("unresolved"));
        }
    }

    #[tokio::test]
    async fn every_row_appears_exactly_once() {
        let (report, sink) = clean_rows(
            rows(25),
            layout(),
            EchoService,
            MemorySink::default(),
            &run_config(4, 7),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.rows_total, 25);
        let mut indices: Vec<usize> = sink.records().iter().map(|r| r.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn one_failing_company_field_degrades_only_that_field() {
        let mut input = rows(10);
        input[4].fields[2].1 = "FailCo".into();

        let (report, sink) = clean_rows(
            input,
            layout(),
            FailCompanyService { fail_value: "FailCo" },
            MemorySink::default(),
            &run_config(3, 10),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.rows_processed, 10);
        assert_eq!(report.unresolved_fields, 1);

        let layout = layout();
        let conf_pos = layout.position("confiance_entreprise").unwrap();
        let conf_nom_pos = layout.position("confiance_nom").unwrap();
        let source_pos = layout.position("source_validation").unwrap();

        let records = sink.records();
        let degraded = records.iter().find(|r| r.index == 4).unwrap();
        assert_eq!(degraded.values[conf_pos], "0.00");
        assert!(degraded.values[source_pos].contains("company:unresolved"));
        // Name fields on the same row are untouched
        assert_eq!(degraded.values[conf_nom_pos], "1.00");
        assert!(degraded.values[source_pos].starts_with("lastname:ok"));
    }

    // -----------------------------------------------------------------------
    // Persistence failure handling
    // -----------------------------------------------------------------------

    struct FlakySink {
        inner: MemorySink,
        failures_left: usize,
    }

    impl RecordSink for FlakySink {
        fn append_batch(&mut self, records: &[OutputRecord]) -> Result<()> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(ProspectCleanError::Persistence("disk full".into()));
            }
            self.inner.append_batch(records)
        }
    }

    #[tokio::test]
    async fn single_flush_failure_is_retried_without_duplication() {
        let (report, sink) = clean_rows(
            rows(12),
            layout(),
            EchoService,
            FlakySink {
                inner: MemorySink::default(),
                failures_left: 1,
            },
            &run_config(3, 10),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.rows_processed, 12);
        let mut indices: Vec<usize> = sink.inner.records().iter().map(|r| r.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn persistent_flush_failure_is_fatal() {
        let result = clean_rows(
            rows(12),
            layout(),
            EchoService,
            FlakySink {
                inner: MemorySink::default(),
                failures_left: 99,
            },
            &run_config(3, 10),
            &SilentProgress,
        )
        .await;

        match result {
            Err(ProspectCleanError::Persistence(_)) => {}
            Err(other) => panic!("expected persistence error, got {other}"),
            Ok(_) => panic!("expected persistence error, run succeeded"),
        }
    }

    // -----------------------------------------------------------------------
    // File-backed end-to-end
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn csv_end_to_end_preserves_input_order() {
        let dir = std::env::temp_dir().join(format!("pc-pipeline-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.csv");
        let output = dir.join("out.csv");

        let mut content = String::from("nom,prenom,raison_sociale,email\n");
        for i in 0..5 {
            content.push_str(&format!("Nom{i},Prenom{i},Societe{i},p{i}@s{i}.fr\n"));
        }
        std::fs::write(&input, content).unwrap();

        let config = CleanConfig {
            input,
            output: output.clone(),
            run: run_config(3, 2),
        };

        let report = clean_prospects(&config, EchoService, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.rows_processed, 5);

        let written = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("nom,prenom,raison_sociale,email,nom_valide"));
        for (i, line) in lines[1..].iter().enumerate() {
            assert!(line.starts_with(&format!("Nom{i},")), "line {i}: {line}");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}
