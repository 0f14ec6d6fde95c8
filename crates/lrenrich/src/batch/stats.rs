use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::Stage;
use crate::preview::CacheStats;
use crate::worker::ProcessingResult;

/// Run-scoped counters, shared by every worker behind one mutex.
pub type SharedStats = Arc<Mutex<ProcessingStats>>;

pub fn lock_stats(stats: &SharedStats) -> MutexGuard<'_, ProcessingStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub total_images: u64,
    pub processed_images: u64,
    pub successful_images: u64,
    pub failed_images: u64,
    pub skipped_images: u64,
    pub preview_found: u64,
    pub failures_by_stage: BTreeMap<Stage, u64>,
    pub started_at: DateTime<Utc>,
    pub total_time: Duration,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            total_images: 0,
            processed_images: 0,
            successful_images: 0,
            failed_images: 0,
            skipped_images: 0,
            preview_found: 0,
            failures_by_stage: BTreeMap::new(),
            started_at: Utc::now(),
            total_time: Duration::ZERO,
        }
    }

    pub fn record(&mut self, result: &ProcessingResult) {
        self.processed_images += 1;
        if result.success {
            self.successful_images += 1;
        } else {
            self.failed_images += 1;
            *self.failures_by_stage.entry(result.stage).or_insert(0) += 1;
        }
    }

    /// Percentage of processed images that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.processed_images == 0 {
            0.0
        } else {
            self.successful_images as f64 / self.processed_images as f64 * 100.0
        }
    }

    pub fn avg_time_per_image(&self) -> Duration {
        match u32::try_from(self.processed_images) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_time / n,
            Err(_) => Duration::from_secs_f64(
                self.total_time.as_secs_f64() / self.processed_images as f64,
            ),
        }
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Final statistics of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub stats: ProcessingStats,
    pub success_rate: f64,
    pub avg_time_per_image: Duration,
    pub cache: CacheStats,
    pub interrupted: bool,
}

impl RunReport {
    pub fn new(stats: ProcessingStats, cache: CacheStats, interrupted: bool) -> Self {
        Self {
            success_rate: stats.success_rate(),
            avg_time_per_image: stats.avg_time_per_image(),
            stats,
            cache,
            interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecord;
    use std::path::PathBuf;

    fn result(id: i64, stage: Stage, success: bool) -> ProcessingResult {
        let record = CatalogRecord {
            record_id: id,
            file_id: id,
            base_name: format!("{}.jpg", id),
            path_from_root: String::new(),
            root_folder: PathBuf::new(),
            image_global_id: None,
            file_global_id: None,
            capture_time: None,
        };
        if success {
            ProcessingResult::success(&record, PathBuf::from("/p"))
        } else {
            ProcessingResult::failure(&record, stage, "failed")
        }
    }

    #[test]
    fn test_record_counts() {
        let mut stats = ProcessingStats::new();
        stats.record(&result(1, Stage::Persisted, true));
        stats.record(&result(2, Stage::Analyzed, false));
        stats.record(&result(3, Stage::Analyzed, false));
        stats.record(&result(4, Stage::Located, false));

        assert_eq!(stats.processed_images, 4);
        assert_eq!(stats.successful_images, 1);
        assert_eq!(stats.failed_images, 3);
        assert_eq!(stats.failures_by_stage[&Stage::Analyzed], 2);
        assert_eq!(stats.failures_by_stage[&Stage::Located], 1);
        assert!((stats.success_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_avg_time() {
        let mut stats = ProcessingStats::new();
        assert_eq!(stats.avg_time_per_image(), Duration::ZERO);

        stats.processed_images = 4;
        stats.total_time = Duration::from_secs(10);
        assert_eq!(stats.avg_time_per_image(), Duration::from_millis(2500));
    }

    #[test]
    fn test_report_serializes_flat() {
        let mut stats = ProcessingStats::new();
        stats.record(&result(1, Stage::Decoded, false));
        let report = RunReport::new(stats, CacheStats::default(), false);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["failed_images"], 1);
        assert_eq!(value["failures_by_stage"]["decoded"], 1);
        assert_eq!(value["interrupted"], false);
    }
}
