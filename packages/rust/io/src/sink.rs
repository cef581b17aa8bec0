//! CSV output boundary: index-merged, atomically rewritten destination.
//!
//! Each flushed batch is merged into an in-memory mirror keyed by input row
//! index, then the whole file is rewritten through a temp file + rename.
//! The destination is therefore strictly input-ordered at every observation
//! point, and a failed write never touches previously flushed data.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use prospectclean_shared::{OutputRecord, ProspectCleanError, RecordSink, Result};
use tracing::debug;

/// Destination writer for cleaned prospect tables.
pub struct CsvSink {
    path: PathBuf,
    header: Vec<String>,
    /// Mirror of everything flushed so far, keyed by input row index.
    written: BTreeMap<usize, OutputRecord>,
}

impl CsvSink {
    /// Create the destination file with its header row.
    pub fn create(path: &Path, header: Vec<String>) -> Result<Self> {
        let sink = Self {
            path: path.to_path_buf(),
            header,
            written: BTreeMap::new(),
        };
        sink.write_all(&sink.written)?;
        Ok(sink)
    }

    /// Number of records flushed to the destination so far.
    pub fn record_count(&self) -> usize {
        self.written.len()
    }

    /// Rewrite the destination from `records`, atomically.
    fn write_all(&self, records: &BTreeMap<usize, OutputRecord>) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");

        {
            let file = std::fs::File::create(&tmp)
                .map_err(|e| ProspectCleanError::Persistence(format!("{}: {e}", tmp.display())))?;
            let mut writer = csv::Writer::from_writer(file);

            writer
                .write_record(&self.header)
                .map_err(|e| ProspectCleanError::Persistence(e.to_string()))?;
            for record in records.values() {
                writer
                    .write_record(&record.values)
                    .map_err(|e| ProspectCleanError::Persistence(e.to_string()))?;
            }
            writer
                .flush()
                .map_err(|e| ProspectCleanError::Persistence(e.to_string()))?;
        }

        std::fs::rename(&tmp, &self.path).map_err(|e| {
            ProspectCleanError::Persistence(format!(
                "{} -> {}: {e}",
                tmp.display(),
                self.path.display()
            ))
        })
    }
}

impl RecordSink for CsvSink {
    fn append_batch(&mut self, records: &[OutputRecord]) -> Result<()> {
        // Merge into a candidate view first; the mirror is only committed
        // once the rewrite has landed on disk.
        let mut merged = self.written.clone();
        for record in records {
            merged.insert(record.index, record.clone());
        }

        self.write_all(&merged)?;

        debug!(
            batch = records.len(),
            total = merged.len(),
            path = %self.path.display(),
            "batch flushed"
        );
        self.written = merged;
        Ok(())
    }
}
