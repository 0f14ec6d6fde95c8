use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::analyzer::{create_analyzer, ImageAnalyzer};
use crate::batch::{BatchProcessor, ProcessingStats, RunReport, SharedStats};
use crate::catalog::{CatalogRecord, CatalogStore, LightroomCatalog};
use crate::config::Config;
use crate::decoder::PreviewDecoder;
use crate::error::Result;
use crate::pipeline::{ImagePipeline, LogProgress, PipelineConfig, ProgressReporter};
use crate::preview::{PreviewLocator, ScanSummary};

/// Everything needed to enrich one catalog, wired together.
pub struct Enricher {
    config: PipelineConfig,
    catalog: Arc<LightroomCatalog>,
    locator: Arc<PreviewLocator>,
    decoder: PreviewDecoder,
    analyzer: Arc<dyn ImageAnalyzer>,
    stats: SharedStats,
    progress: Arc<dyn ProgressReporter>,
    interrupt: Arc<AtomicBool>,
}

impl Enricher {
    /// Opens the catalog and builds the analyzer named in `config`.
    pub fn open(catalog_path: &Path, config: &Config) -> Result<Self> {
        let analyzer = create_analyzer(&config.analyzer)?;
        Self::open_with_analyzer(catalog_path, config, analyzer)
    }

    pub fn open_with_analyzer(
        catalog_path: &Path,
        config: &Config,
        analyzer: Arc<dyn ImageAnalyzer>,
    ) -> Result<Self> {
        let settings = PipelineConfig::from_config(config, catalog_path);
        let catalog = LightroomCatalog::open(catalog_path, settings.catalog.clone())?;

        let mut locator = PreviewLocator::new(settings.preview_dirs.clone(), settings.locator.clone());
        locator.optimize(catalog.schema());

        info!(
            workers = settings.worker_count,
            batch_size = settings.batch_size,
            checkpoint = settings.use_checkpoint,
            analyzer = analyzer.name(),
            "Enricher ready"
        );

        Ok(Self {
            config: settings,
            catalog: Arc::new(catalog),
            locator: Arc::new(locator),
            decoder: PreviewDecoder::new(),
            analyzer,
            stats: Arc::new(Mutex::new(ProcessingStats::new())),
            progress: Arc::new(LogProgress),
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LightroomCatalog {
        &self.catalog
    }

    pub fn locator(&self) -> &PreviewLocator {
        &self.locator
    }

    pub fn decoder(&self) -> &PreviewDecoder {
        &self.decoder
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Routes Ctrl-C to the interrupt flag. The current batch still finishes.
    /// Can only be installed once per process.
    pub fn install_interrupt_handler(&self) -> Result<()> {
        let flag = Arc::clone(&self.interrupt);
        ctrlc::set_handler(move || {
            if !flag.swap(true, Ordering::SeqCst) {
                warn!("Interrupt received, finishing current batch");
            }
        })?;
        Ok(())
    }

    fn batch_processor(&self) -> BatchProcessor {
        let catalog: Arc<dyn CatalogStore> = self.catalog.clone();
        let pipeline = ImagePipeline::new(
            &self.config,
            Arc::clone(&self.locator),
            self.decoder.clone(),
            Arc::clone(&self.analyzer),
            Arc::clone(&catalog),
            Arc::clone(&self.stats),
        );
        BatchProcessor::new(
            self.config.clone(),
            catalog,
            Arc::clone(&self.locator),
            Arc::new(pipeline),
            Arc::clone(&self.stats),
        )
        .with_progress(Arc::clone(&self.progress))
        .with_interrupt_flag(Arc::clone(&self.interrupt))
    }

    /// Processes every eligible catalog record.
    pub fn run(&self) -> Result<RunReport> {
        self.batch_processor().run(None)
    }

    /// Processes the given records instead of querying the catalog.
    pub fn run_records(&self, records: Vec<CatalogRecord>) -> Result<RunReport> {
        self.batch_processor().run(Some(records))
    }

    /// Reports how many candidates have a locatable preview.
    pub fn scan_previews(&self) -> Result<ScanSummary> {
        self.batch_processor().scan_previews(None)
    }

    pub fn clear_checkpoint(&self) -> bool {
        self.config.checkpoint_store().clear()
    }
}
