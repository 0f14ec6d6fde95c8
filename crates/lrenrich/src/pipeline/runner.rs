use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info_span, warn};

use crate::analyzer::{prepare_for_analysis, ImageAnalyzer};
use crate::batch::stats::{lock_stats, SharedStats};
use crate::catalog::{CatalogRecord, CatalogStore};
use crate::decoder::PreviewDecoder;
use crate::preview::PreviewLocator;
use crate::worker::ProcessingResult;

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::ItemProcessor;

/// What a run got to before finishing or failing.
#[derive(Default)]
struct Trace {
    preview_path: Option<PathBuf>,
    dimensions: Option<(u32, u32)>,
}

/// locate → decode → prepare → analyze → persist for one record.
pub struct ImagePipeline {
    locator: Arc<PreviewLocator>,
    decoder: PreviewDecoder,
    analyzer: Arc<dyn ImageAnalyzer>,
    catalog: Arc<dyn CatalogStore>,
    stats: SharedStats,
    max_resolution: u32,
    jpeg_quality: u8,
}

impl ImagePipeline {
    pub fn new(
        config: &PipelineConfig,
        locator: Arc<PreviewLocator>,
        decoder: PreviewDecoder,
        analyzer: Arc<dyn ImageAnalyzer>,
        catalog: Arc<dyn CatalogStore>,
        stats: SharedStats,
    ) -> Self {
        Self {
            locator,
            decoder,
            analyzer,
            catalog,
            stats,
            max_resolution: config.preview_max_resolution,
            jpeg_quality: config.jpeg_quality,
        }
    }

    fn run_steps(&self, record: &CatalogRecord, trace: &mut Trace) -> Result<(), PipelineError> {
        // Step 1: Locate
        let path = {
            let _step = info_span!("locate").entered();
            self.locator
                .locate(record)
                .ok_or_else(|| PipelineError::NotFound {
                    base_name: record.base_name.clone(),
                })?
        };
        trace.preview_path = Some(path.clone());
        lock_stats(&self.stats).preview_found += 1;

        // Steps 2+3: Decode and prepare. The bitmap is dropped at the end of
        // this block, before the analyzer runs.
        let prepared = {
            let decoded = {
                let _step = info_span!("decode").entered();
                self.decoder.decode(&path)?
            };
            trace.dimensions = Some(decoded.dimensions());

            let _step = info_span!("prepare").entered();
            prepare_for_analysis(decoded.image(), self.max_resolution, self.jpeg_quality)
                .map_err(PipelineError::Prepare)?
        };

        // Step 4: Analyze
        let metadata = {
            let _step = info_span!("analyze", analyzer = self.analyzer.name()).entered();
            self.analyzer
                .analyze(&prepared)?
                .ok_or(PipelineError::NoResult)?
        };

        // Step 5: Persist
        {
            let _step = info_span!("persist").entered();
            self.catalog
                .write_metadata(record.record_id, &metadata)
                .map_err(PipelineError::Persist)?;
        }
        Ok(())
    }
}

impl ItemProcessor for ImagePipeline {
    fn process(&self, record: &CatalogRecord) -> ProcessingResult {
        let started = Instant::now();
        let _span = info_span!(
            "process_image",
            record_id = record.record_id,
            base_name = %record.base_name
        )
        .entered();

        let mut trace = Trace::default();
        let result = match self.run_steps(record, &mut trace) {
            Ok(()) => {
                debug!("Processed {}", record.base_name);
                let path = trace.preview_path.clone().unwrap_or_default();
                ProcessingResult::success(record, path).with_preview(None, trace.dimensions)
            }
            Err(e) => {
                let stage = e.stage();
                warn!(stage = %stage, "Failed to process {}: {}", record.base_name, e);
                ProcessingResult::failure(record, stage, e.to_string())
                    .with_preview(trace.preview_path, trace.dimensions)
            }
        };
        result.with_elapsed(started.elapsed())
    }
}
