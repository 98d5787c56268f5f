//! Batch Runner
//!
//! Runs a per-record async job over a list with bounded fan-out. A failing
//! record is logged and counted; a fatal error ends the batch.

use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cancellation::StopSignal;
use crate::error::{BullhornError, BullhornResult};

/// Default number of records processed at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Outcome counts for a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Records whose job was started.
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records never started because of stop or a fatal error.
    pub skipped: usize,
    /// Whether the stop signal cut the batch short.
    pub stopped: bool,
}

/// Bounded fan-out runner.
#[derive(Clone, Debug)]
pub struct BatchRunner {
    concurrency: usize,
    stop: StopSignal,
}

enum Outcome {
    Succeeded,
    Failed,
    Fatal(BullhornError),
}

impl BatchRunner {
    pub fn new(stop: StopSignal) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            stop,
        }
    }

    /// Set fan-out. Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// One record at a time.
    pub fn sequential(stop: StopSignal) -> Self {
        Self::new(stop).with_concurrency(1)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `job` for every item.
    ///
    /// The stop signal is checked before each record starts. Records already
    /// running when stop is observed finish normally. The first fatal error
    /// is returned once running records have drained.
    pub async fn run<I, F, Fut>(&self, items: Vec<I>, job: F) -> BullhornResult<BatchSummary>
    where
        I: Display,
        F: Fn(I) -> Fut,
        Fut: Future<Output = BullhornResult<()>>,
    {
        let total = items.len();
        let mut summary = BatchSummary::default();
        let mut fatal: Option<BullhornError> = None;
        let halted = AtomicBool::new(false);

        let job = &job;
        let stop = &self.stop;
        let halted = &halted;

        let mut results = stream::iter(items)
            .take_while(move |_| {
                let proceed = !stop.should_stop() && !halted.load(Ordering::SeqCst);
                futures::future::ready(proceed)
            })
            .map(move |item| async move {
                let label = item.to_string();
                match job(item).await {
                    Ok(()) => Outcome::Succeeded,
                    Err(error) if error.is_fatal() => {
                        halted.store(true, Ordering::SeqCst);
                        tracing::error!(record = %label, error = %error, "Fatal error, stopping batch");
                        Outcome::Fatal(error)
                    }
                    Err(error) => {
                        tracing::error!(
                            record = %label,
                            error = %error,
                            code = error.error_code(),
                            "Record failed, continuing"
                        );
                        Outcome::Failed
                    }
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = results.next().await {
            summary.started += 1;
            match outcome {
                Outcome::Succeeded => summary.succeeded += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Fatal(error) => {
                    summary.failed += 1;
                    fatal.get_or_insert(error);
                }
            }
        }

        summary.skipped = total - summary.started;
        summary.stopped = self.stop.should_stop() && summary.skipped > 0;

        if summary.stopped {
            tracing::warn!(
                skipped = summary.skipped,
                "Stopped before processing all records"
            );
        }
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch finished"
        );

        match fatal {
            Some(error) => Err(error),
            None => Ok(summary),
        }
    }
}
