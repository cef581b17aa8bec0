//! Bounded-concurrency execution of per-row work.
//!
//! A fixed-size semaphore caps how many rows are in flight against the
//! reasoning service; independent rows progress in parallel and one slow or
//! failed row never blocks the others.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

use prospectclean_shared::{OutputRecord, ProspectCleanError, ProspectRow, Result};

/// Schedules row tasks under a concurrency bound.
pub struct RowScheduler {
    max_in_flight: usize,
}

impl RowScheduler {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Run `work` for every row, with at most `max_in_flight` rows in
    /// flight at once.
    ///
    /// Completed records arrive on the returned channel in completion
    /// order, not input order. A row whose work fails is converted through
    /// `degrade` into a stand-in record for that row alone; the run
    /// continues. Dropping the receiver cancels rows that have not started.
    pub fn run<W, Fut, D>(
        &self,
        rows: Vec<ProspectRow>,
        work: W,
        degrade: D,
    ) -> mpsc::Receiver<OutputRecord>
    where
        W: Fn(ProspectRow) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OutputRecord>> + Send + 'static,
        D: Fn(&ProspectRow, &ProspectCleanError) -> OutputRecord + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(self.max_in_flight);
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let work = Arc::new(work);
        let degrade = Arc::new(degrade);

        let total = rows.len();
        debug!(total, max_in_flight = self.max_in_flight, "scheduling rows");

        tokio::spawn(async move {
            for row in rows {
                // Slot acquisition happens in input order; the semaphore is
                // never closed, so acquire only fails on shutdown.
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                if tx.is_closed() {
                    break;
                }

                let tx = tx.clone();
                let work = work.clone();
                let degrade = degrade.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let fallback = row.clone();
                    let record = match work(row).await {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(index = fallback.index, error = %e, "row processing degraded");
                            degrade(&fallback, &e)
                        }
                    };
                    let _ = tx.send(record).await;
                });
            }
        });

        rx
    }
}
