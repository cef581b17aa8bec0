//! Batched persistence of completed output records.
//!
//! Records accumulate in completion order; every `batch_size` appends the
//! whole batch is flushed to the sink sorted by input index and the batch
//! state is cleared. A failed flush keeps the batch in memory so the caller
//! can retry without losing completed work.

use prospectclean_shared::{OutputRecord, RecordSink, Result};
use tracing::debug;

/// Accumulates output records and flushes them in fixed-size batches.
pub struct BatchPersister<S> {
    sink: S,
    batch_size: usize,
    pending: Vec<OutputRecord>,
}

impl<S: RecordSink> BatchPersister<S> {
    pub fn new(sink: S, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
        }
    }

    /// Add a completed record; flushes once the batch threshold is reached.
    pub fn append(&mut self, record: OutputRecord) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the pending batch to the sink in input-index order and clear
    /// it. On failure the batch is retained for a retry.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.pending.sort_by_key(|r| r.index);
        self.sink.append_batch(&self.pending)?;
        debug!(flushed = self.pending.len(), "batch persisted");
        self.pending.clear();
        Ok(())
    }

    /// Flush whatever remains at pipeline end, regardless of size.
    pub fn flush_remainder(&mut self) -> Result<()> {
        self.flush()
    }

    /// Number of unflushed records currently held.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consume the persister and return its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Records every flushed batch in memory. For headless runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Each flush as it arrived.
    pub flushes: Vec<Vec<OutputRecord>>,
}

impl MemorySink {
    /// All flushed records, in flush order.
    pub fn records(&self) -> Vec<&OutputRecord> {
        self.flushes.iter().flatten().collect()
    }
}

impl RecordSink for MemorySink {
    fn append_batch(&mut self, records: &[OutputRecord]) -> Result<()> {
        self.flushes.push(records.to_vec());
        Ok(())
    }
}
