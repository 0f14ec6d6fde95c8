//! Builders for creating test data programmatically.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rusqlite::{params, Connection};

use lrenrich::analyzer::{AnalysisMetadata, AnalyzerError, ImageAnalyzer, PreparedImage};
use lrenrich::config::Config;

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Single worker, no memory valve, checkpoints on.
    pub fn new() -> Self {
        Self {
            config: Config {
                max_workers: 1,
                memory_limit_mb: 0,
                ..Config::default()
            },
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.max_workers = count;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn checkpoint(mut self, enabled: bool) -> Self {
        self.config.use_checkpoint = enabled;
        self
    }

    pub fn hierarchical_keywords(mut self, enabled: bool) -> Self {
        self.config.use_hierarchical_keywords = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const CATALOG_DDL: &str = "
    CREATE TABLE AgLibraryRootFolder (id_local INTEGER PRIMARY KEY, absolutePath TEXT);
    CREATE TABLE AgLibraryFolder (id_local INTEGER PRIMARY KEY, rootFolder INTEGER, pathFromRoot TEXT);
    CREATE TABLE AgLibraryFile (
        id_local INTEGER PRIMARY KEY, folder INTEGER, baseName TEXT, importHash TEXT, id_global TEXT
    );
    CREATE TABLE Adobe_images (
        id_local INTEGER PRIMARY KEY, rootFile INTEGER, id_global TEXT,
        captureTime TEXT, rating REAL, caption TEXT
    );
    CREATE TABLE AgLibraryKeyword (
        id_local INTEGER PRIMARY KEY, name TEXT, lc_name TEXT, includeOnExport INTEGER, id_global TEXT
    );
    CREATE TABLE AgLibraryKeywordImage (id_local INTEGER PRIMARY KEY, image INTEGER, tag INTEGER);
    CREATE TABLE Adobe_additionalMetadata (
        id_local INTEGER PRIMARY KEY, image INTEGER, externalEditingData TEXT
    );
";

/// Builder for a Lightroom-shaped catalog file.
pub struct CatalogBuilder {
    path: PathBuf,
    root_folder: String,
    photos: Vec<(i64, String)>,
}

impl CatalogBuilder {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            root_folder: "/photos/".to_string(),
            photos: Vec::new(),
        }
    }

    pub fn root_folder(mut self, root: &str) -> Self {
        self.root_folder = root.to_string();
        self
    }

    /// Adds an image row and its file row; the file id is `record_id + 1000`.
    pub fn photo(mut self, record_id: i64, base_name: &str) -> Self {
        self.photos.push((record_id, base_name.to_string()));
        self
    }

    pub fn build(self) -> PathBuf {
        let conn = Connection::open(&self.path).expect("Failed to create catalog");
        conn.execute_batch(CATALOG_DDL).expect("Failed to create tables");
        conn.execute(
            "INSERT INTO AgLibraryRootFolder (id_local, absolutePath) VALUES (1, ?1)",
            params![self.root_folder],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO AgLibraryFolder (id_local, rootFolder, pathFromRoot) VALUES (1, 1, 'shoot/')",
            [],
        )
        .unwrap();
        for (record_id, base_name) in &self.photos {
            conn.execute(
                "INSERT INTO AgLibraryFile (id_local, folder, baseName, importHash, id_global)
                 VALUES (?1, 1, ?2, 'hash', ?3)",
                params![record_id + 1000, base_name, format!("{:032X}", record_id + 0xF00)],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO Adobe_images (id_local, rootFile, id_global, captureTime)
                 VALUES (?1, ?2, ?3, '2024-03-01T09:30:00')",
                params![record_id, record_id + 1000, format!("{:032X}", record_id + 0xA00)],
            )
            .unwrap();
        }
        self.path
    }
}

/// A solid-colour JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 150])))
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("Failed to encode JPEG");
    out.into_inner()
}

pub fn sample_metadata() -> AnalysisMetadata {
    let mut metadata = AnalysisMetadata {
        keywords: vec!["harbor".to_string(), "boats".to_string()],
        tags: vec!["blue hour".to_string()],
        aesthetic_score: 7.0,
        description: Some("Boats moored in a quiet harbor.".to_string()),
        ..AnalysisMetadata::default()
    };
    metadata
        .categories
        .insert("mood".to_string(), vec!["Calm".to_string()]);
    metadata
}

/// Answers for landscape images only; portrait images get no result.
pub struct LandscapeOnlyAnalyzer;

impl ImageAnalyzer for LandscapeOnlyAnalyzer {
    fn name(&self) -> &str {
        "landscape-only"
    }

    fn analyze(&self, image: &PreparedImage) -> Result<Option<AnalysisMetadata>, AnalyzerError> {
        Ok((image.width >= image.height).then(sample_metadata))
    }
}

/// Always answers with [`sample_metadata`].
pub struct AlwaysAnalyzer;

impl ImageAnalyzer for AlwaysAnalyzer {
    fn name(&self) -> &str {
        "always"
    }

    fn analyze(&self, _image: &PreparedImage) -> Result<Option<AnalysisMetadata>, AnalyzerError> {
        Ok(Some(sample_metadata()))
    }
}
