use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use crate::batch::memory::{MemoryGuard, ProcessMemoryProbe};
use crate::batch::stats::{lock_stats, ProcessingStats, RunReport, SharedStats};
use crate::catalog::{CatalogRecord, CatalogStore};
use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::pipeline::{ItemProcessor, LogProgress, PipelineConfig, ProgressEvent, ProgressReporter};
use crate::preview::{PreviewLocator, ScanSummary};
use crate::worker::{process_guarded, ProcessingResult, WorkerPool};

/// Drives one run: fetch, filter, then batch after batch of processing with
/// checkpointing and a memory check in between.
pub struct BatchProcessor {
    config: PipelineConfig,
    catalog: Arc<dyn CatalogStore>,
    locator: Arc<PreviewLocator>,
    processor: Arc<dyn ItemProcessor>,
    checkpoint: CheckpointStore,
    memory: MemoryGuard,
    stats: SharedStats,
    progress: Arc<dyn ProgressReporter>,
    interrupt: Arc<AtomicBool>,
}

impl BatchProcessor {
    pub fn new(
        config: PipelineConfig,
        catalog: Arc<dyn CatalogStore>,
        locator: Arc<PreviewLocator>,
        processor: Arc<dyn ItemProcessor>,
        stats: SharedStats,
    ) -> Self {
        let checkpoint = config.checkpoint_store();
        let memory = MemoryGuard::new(
            Box::new(ProcessMemoryProbe::new()),
            config.memory_limit_bytes,
            config.memory_pressure_ratio,
        );
        Self {
            config,
            catalog,
            locator,
            processor,
            checkpoint,
            memory,
            stats,
            progress: Arc::new(LogProgress),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_memory_guard(mut self, memory: MemoryGuard) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Set to stop dispatching further batches. Items already dispatched finish.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    fn fetch(&self, records: Option<Vec<CatalogRecord>>) -> Result<Vec<CatalogRecord>> {
        match records {
            Some(records) => Ok(records),
            None => Ok(self.catalog.list_candidates(self.config.max_images)?),
        }
    }

    /// Checkpoint ids plus ids the catalog already marks as processed.
    fn processed_ids(&self) -> HashSet<i64> {
        let mut ids = self.checkpoint.load();
        match self.catalog.list_already_tagged() {
            Ok(tagged) => ids.extend(tagged),
            Err(e) => warn!("Could not read already-processed records: {}", e),
        }
        ids
    }

    fn run_one_batch(&self, pool: Option<&WorkerPool>, batch: &[CatalogRecord]) -> Vec<ProcessingResult> {
        match pool {
            Some(pool) => pool.run_batch(batch),
            None => batch
                .iter()
                .map(|record| process_guarded(self.processor.as_ref(), record))
                .collect(),
        }
    }

    pub fn run(&self, records: Option<Vec<CatalogRecord>>) -> Result<RunReport> {
        let started = Instant::now();
        *lock_stats(&self.stats) = ProcessingStats::new();

        let candidates = self.fetch(records)?;
        let mut processed_ids = self.processed_ids();

        let candidate_count = candidates.len();
        let remaining: Vec<CatalogRecord> = candidates
            .into_iter()
            .filter(|r| !processed_ids.contains(&r.record_id))
            .collect();
        let skipped = candidate_count - remaining.len();

        {
            let mut stats = lock_stats(&self.stats);
            stats.total_images = remaining.len() as u64;
            stats.skipped_images = skipped as u64;
        }
        info!(
            candidates = candidate_count,
            skipped,
            remaining = remaining.len(),
            "Starting enrichment run"
        );

        let batch_size = self.config.batch_size.max(1);
        let interval = self.config.checkpoint_interval.max(1);
        let batch_total = remaining.len().div_ceil(batch_size);
        let mut interrupted = false;

        let pool = if self.config.worker_count > 1 && !remaining.is_empty() {
            Some(WorkerPool::new(
                Arc::clone(&self.processor),
                self.config.worker_count,
            )?)
        } else {
            None
        };

        for (index, batch) in remaining.chunks(batch_size).enumerate() {
            if self.interrupt.load(Ordering::SeqCst) {
                warn!("Interrupted, not starting batch {}/{}", index + 1, batch_total);
                interrupted = true;
                break;
            }
            let batch_num = index + 1;
            let _span = info_span!("batch", batch = batch_num, size = batch.len()).entered();

            let results = self.run_one_batch(pool.as_ref(), batch);

            {
                let mut stats = lock_stats(&self.stats);
                for result in &results {
                    stats.record(result);
                    if result.success {
                        processed_ids.insert(result.record_id);
                    } else {
                        debug!(
                            record_id = result.record_id,
                            stage = %result.stage,
                            "{}: {}",
                            result.base_name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
            }

            if batch_num % interval == 0 {
                self.checkpoint.save(&processed_ids);
            }
            self.memory.check(&self.locator);
            self.report_progress(batch_num, batch_total, started);
        }

        if let Some(pool) = pool {
            pool.shutdown();
            pool.wait();
        }

        self.checkpoint.save(&processed_ids);

        let stats = {
            let mut stats = lock_stats(&self.stats);
            stats.total_time = started.elapsed();
            stats.clone()
        };
        let report = RunReport::new(stats, self.locator.cache_stats(), interrupted);
        log_summary(&report);

        self.progress.report(ProgressEvent::Finished {
            processed: report.stats.processed_images,
            successful: report.stats.successful_images,
            failed: report.stats.failed_images,
            skipped: report.stats.skipped_images,
            elapsed: report.stats.total_time,
            interrupted,
        });
        Ok(report)
    }

    fn report_progress(&self, batch: usize, batches: usize, started: Instant) {
        let (processed, total) = {
            let stats = lock_stats(&self.stats);
            (stats.processed_images, stats.total_images)
        };
        let elapsed = started.elapsed();
        let avg_per_item = if processed == 0 {
            Duration::ZERO
        } else {
            elapsed.div_f64(processed as f64)
        };
        let eta = (processed > 0)
            .then(|| avg_per_item.mul_f64(total.saturating_sub(processed) as f64));

        self.progress.report(ProgressEvent::BatchCompleted {
            batch,
            batches,
            processed,
            total,
            elapsed,
            avg_per_item,
            eta,
        });
    }

    /// Locates previews for every candidate without decoding or analysis.
    pub fn scan_previews(&self, records: Option<Vec<CatalogRecord>>) -> Result<ScanSummary> {
        let candidates = self.fetch(records)?;
        Ok(self.locator.scan(&candidates))
    }
}

fn log_summary(report: &RunReport) {
    let stats = &report.stats;
    info!("==== Enrichment summary ====");
    info!("Total to process: {}", stats.total_images);
    info!("Processed:        {}", stats.processed_images);
    info!("Successful:       {}", stats.successful_images);
    info!("Failed:           {}", stats.failed_images);
    info!("Skipped:          {}", stats.skipped_images);
    info!("Previews found:   {}", stats.preview_found);
    info!("Success rate:     {:.1}%", report.success_rate);
    info!(
        "Time:             {:.1}s ({:.2}s/image)",
        stats.total_time.as_secs_f64(),
        report.avg_time_per_image.as_secs_f64()
    );
    for (stage, count) in &stats.failures_by_stage {
        info!("  failed at {:<10} {}", stage.as_str(), count);
    }
    info!(
        "Preview cache: {} entries, {} hits, {} misses ({:.1}% hit rate)",
        report.cache.size,
        report.cache.hits,
        report.cache.misses,
        report.cache.hit_rate * 100.0
    );
    if report.interrupted {
        warn!("Run was interrupted before all batches were dispatched");
    }
}
