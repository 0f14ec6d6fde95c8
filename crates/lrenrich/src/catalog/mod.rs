//! Lightroom catalog access.
//!
//! The catalog is owned by Lightroom: it is opened, never created or migrated.
//! Reads and writes go through [`CatalogGateway`], which opens one connection
//! per transaction and retries lock contention with exponential backoff.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyzer::AnalysisMetadata;
use crate::config::Config;

pub mod caption;
pub mod error;
pub mod gateway;
pub mod metadata_repo;
pub mod record_repo;
pub mod retry;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::DatabaseError;
pub use gateway::CatalogGateway;
pub use metadata_repo::KeywordOptions;
pub use record_repo::PROCESSED_KEYWORD;
pub use retry::{is_lock_contention, retry_on_lock, retry_on_lock_with, RetryPolicy};

/// One photo as the catalog describes it. Never modified by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRecord {
    pub record_id: i64,
    pub file_id: i64,
    pub base_name: String,
    pub path_from_root: String,
    pub root_folder: PathBuf,
    pub image_global_id: Option<String>,
    pub file_global_id: Option<String>,
    pub capture_time: Option<String>,
}

impl CatalogRecord {
    /// The base name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.base_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.base_name)
    }

    /// Absolute path of the original source image.
    pub fn original_path(&self) -> PathBuf {
        self.root_folder
            .join(&self.path_from_root)
            .join(&self.base_name)
    }
}

/// Tables and columns present in an opened catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSchema {
    tables: HashMap<String, HashSet<String>>,
}

impl CatalogSchema {
    pub fn new(tables: HashMap<String, HashSet<String>>) -> Self {
        Self { tables }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }

    /// Whether images carry catalog-wide global identifiers.
    pub fn has_global_ids(&self) -> bool {
        self.has_column("Adobe_images", "id_global")
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub busy_timeout: Duration,
    pub read_retries: u32,
    pub write_retries: u32,
    pub retry_base: Duration,
    pub keywords: KeywordOptions,
}

impl CatalogSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            busy_timeout: Duration::from_millis(config.db_busy_timeout_ms),
            read_retries: config.db_max_retries,
            write_retries: config.db_write_retries,
            retry_base: Duration::from_millis(config.db_retry_base_ms),
            keywords: KeywordOptions {
                hierarchical: config.use_hierarchical_keywords,
                delimiter: config.keyword_delimiter.clone(),
            },
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Catalog operations the batch orchestrator depends on.
pub trait CatalogStore: Send + Sync {
    fn list_candidates(&self, max: Option<usize>) -> Result<Vec<CatalogRecord>, DatabaseError>;

    fn list_already_tagged(&self) -> Result<HashSet<i64>, DatabaseError>;

    fn write_metadata(&self, record_id: i64, metadata: &AnalysisMetadata) -> Result<(), DatabaseError>;
}

/// [`CatalogStore`] over a Lightroom `.lrcat` file.
#[derive(Debug, Clone)]
pub struct LightroomCatalog {
    gateway: CatalogGateway,
    schema: CatalogSchema,
    settings: CatalogSettings,
}

impl LightroomCatalog {
    /// Opens an existing catalog and probes its schema once.
    pub fn open(path: &Path, settings: CatalogSettings) -> Result<Self, DatabaseError> {
        let gateway = CatalogGateway::open(path, settings.busy_timeout, settings.retry_base)?;
        let tables = gateway.with_transaction(settings.read_retries, |tx| {
            Ok(record_repo::probe_tables(tx)?)
        })?;
        let schema = CatalogSchema::new(tables);

        if !schema.has_table("AgLibraryKeywordImage") {
            warn!("Catalog has no keyword link table; keywords cannot be written");
        }
        info!(
            tables = schema.table_count(),
            global_ids = schema.has_global_ids(),
            "Opened catalog {}",
            crate::sanitize::redact_path(path)
        );

        Ok(Self {
            gateway,
            schema,
            settings,
        })
    }

    pub fn path(&self) -> &Path {
        self.gateway.path()
    }

    pub fn schema(&self) -> &CatalogSchema {
        &self.schema
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }
}

impl CatalogStore for LightroomCatalog {
    fn list_candidates(&self, max: Option<usize>) -> Result<Vec<CatalogRecord>, DatabaseError> {
        let records = self.gateway.with_transaction(self.settings.read_retries, |tx| {
            Ok(record_repo::list_candidates(tx, max)?)
        })?;
        debug!("Fetched {} candidate records", records.len());
        Ok(records)
    }

    /// A failed lookup is logged and treated as "nothing tagged yet".
    fn list_already_tagged(&self) -> Result<HashSet<i64>, DatabaseError> {
        let tagged = self
            .gateway
            .with_transaction(self.settings.read_retries, |tx| {
                Ok(record_repo::list_already_tagged(tx)?)
            });
        match tagged {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!("Could not read already-processed records: {}", e);
                Ok(HashSet::new())
            }
        }
    }

    fn write_metadata(&self, record_id: i64, metadata: &AnalysisMetadata) -> Result<(), DatabaseError> {
        self.gateway
            .with_transaction(self.settings.write_retries, |tx| {
                metadata_repo::write_metadata(
                    tx,
                    &self.schema,
                    record_id,
                    metadata,
                    &self.settings.keywords,
                )
            })
    }
}
