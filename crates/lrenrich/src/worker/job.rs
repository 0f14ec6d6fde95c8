use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::error;
use serde::Serialize;

use crate::catalog::CatalogRecord;
use crate::pipeline::{ItemProcessor, Stage};

/// Outcome of processing one record. Built once, never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    pub record_id: i64,
    pub base_name: String,
    pub success: bool,
    pub stage: Stage,
    pub error: Option<String>,
    pub preview_path: Option<PathBuf>,
    pub preview_dimensions: Option<(u32, u32)>,
    pub elapsed: Duration,
}

impl ProcessingResult {
    pub fn success(record: &CatalogRecord, preview_path: PathBuf) -> Self {
        Self {
            record_id: record.record_id,
            base_name: record.base_name.clone(),
            success: true,
            stage: Stage::Persisted,
            error: None,
            preview_path: Some(preview_path),
            preview_dimensions: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn failure(record: &CatalogRecord, stage: Stage, error: impl Into<String>) -> Self {
        Self {
            record_id: record.record_id,
            base_name: record.base_name.clone(),
            success: false,
            stage,
            error: Some(error.into()),
            preview_path: None,
            preview_dimensions: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn exception(record: &CatalogRecord, error: impl Into<String>) -> Self {
        Self::failure(record, Stage::Exception, error)
    }

    pub fn with_preview(mut self, path: Option<PathBuf>, dimensions: Option<(u32, u32)>) -> Self {
        if path.is_some() {
            self.preview_path = path;
        }
        if dimensions.is_some() {
            self.preview_dimensions = dimensions;
        }
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `processor` on `record`, turning a panic into an `exception` result.
pub fn process_guarded(processor: &dyn ItemProcessor, record: &CatalogRecord) -> ProcessingResult {
    let started = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| processor.process(record))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                "Unexpected failure processing record {} ({}): {}",
                record.record_id, record.base_name, message
            );
            ProcessingResult::exception(record, message).with_elapsed(started.elapsed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> CatalogRecord {
        CatalogRecord {
            record_id: id,
            file_id: id + 1000,
            base_name: format!("IMG_{:04}.jpg", id),
            path_from_root: String::new(),
            root_folder: PathBuf::from("/photos"),
            image_global_id: None,
            file_global_id: None,
            capture_time: None,
        }
    }

    struct Panicking;

    impl ItemProcessor for Panicking {
        fn process(&self, _record: &CatalogRecord) -> ProcessingResult {
            panic!("decoder exploded");
        }
    }

    #[test]
    fn test_constructors() {
        let ok = ProcessingResult::success(&record(1), PathBuf::from("/p.jpg"));
        assert!(ok.success);
        assert_eq!(ok.stage, Stage::Persisted);

        let failed = ProcessingResult::failure(&record(2), Stage::Decoded, "bad bytes")
            .with_preview(Some(PathBuf::from("/p.lrprev")), None);
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("bad bytes"));
        assert_eq!(failed.preview_path, Some(PathBuf::from("/p.lrprev")));
    }

    #[test]
    fn test_panic_becomes_exception() {
        let result = process_guarded(&Panicking, &record(3));
        assert!(!result.success);
        assert_eq!(result.stage, Stage::Exception);
        assert_eq!(result.error.as_deref(), Some("decoder exploded"));
        assert_eq!(result.record_id, 3);
    }
}
