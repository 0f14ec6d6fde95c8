use std::time::Duration;

use tracing::info;

/// Events emitted by the batch orchestrator while a run progresses.
/// Purely advisory; nothing branches on them.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    BatchCompleted {
        batch: usize,
        batches: usize,
        processed: u64,
        total: u64,
        elapsed: Duration,
        avg_per_item: Duration,
        eta: Option<Duration>,
    },
    Finished {
        processed: u64,
        successful: u64,
        failed: u64,
        skipped: u64,
        elapsed: Duration,
        interrupted: bool,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes progress to the log.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchCompleted {
                batch,
                batches,
                processed,
                total,
                elapsed,
                avg_per_item,
                eta,
            } => {
                let eta = eta
                    .map(|d| {
                        let finish = chrono::Local::now()
                            + chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());
                        format!("{} (in {}s)", finish.format("%H:%M:%S"), d.as_secs())
                    })
                    .unwrap_or_else(|| "unknown".to_string());
                info!(
                    "Batch {}/{} done: {}/{} images in {:.1}s ({:.2}s/image), ETA {}",
                    batch,
                    batches,
                    processed,
                    total,
                    elapsed.as_secs_f64(),
                    avg_per_item.as_secs_f64(),
                    eta
                );
            }
            ProgressEvent::Finished {
                processed,
                successful,
                failed,
                skipped,
                elapsed,
                interrupted,
            } => {
                info!(
                    processed,
                    successful,
                    failed,
                    skipped,
                    interrupted,
                    "Run finished in {:.1}s",
                    elapsed.as_secs_f64()
                );
            }
        }
    }
}
