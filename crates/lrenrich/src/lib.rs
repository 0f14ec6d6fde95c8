pub mod analyzer;
pub mod batch;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod decoder;
pub mod enricher;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod sanitize;
pub mod telemetry;
pub mod worker;

pub use analyzer::{create_analyzer, AnalysisMetadata, AnalyzerError, ImageAnalyzer, PreparedImage};
pub use batch::{BatchProcessor, MemoryGuard, MemoryProbe, ProcessingStats, RunReport};
pub use catalog::{CatalogRecord, CatalogStore, DatabaseError, LightroomCatalog};
pub use checkpoint::CheckpointStore;
pub use config::{load_config, Config};
pub use decoder::{DecodeError, DecodedPreview, PreviewDecoder};
pub use enricher::Enricher;
pub use error::{ConfigError, EnrichError, Result, WorkerError};
pub use pipeline::{ImagePipeline, ItemProcessor, PipelineConfig, ProgressEvent, ProgressReporter, Stage};
pub use preview::{PreviewLocator, ResolutionRank, ScanSummary};
pub use worker::{ProcessingResult, WorkerPool};
