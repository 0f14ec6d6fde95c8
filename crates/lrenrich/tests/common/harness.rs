//! Test harness for isolated test execution.
//!
//! `TestHarness` owns a temporary directory holding a catalog, its preview
//! folder and its checkpoint file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection};
use tempfile::TempDir;

use lrenrich::analyzer::ImageAnalyzer;
use lrenrich::config::Config;
use lrenrich::pipeline::NoopProgress;
use lrenrich::preview::PreviewDirs;
use lrenrich::Enricher;

use super::builders::{jpeg_bytes, CatalogBuilder};

pub struct TestHarness {
    temp_dir: TempDir,
    pub catalog_path: PathBuf,
    pub dirs: PreviewDirs,
}

impl TestHarness {
    /// Catalog with one photo per `(record_id, base_name)` pair.
    pub fn new(photos: &[(i64, &str)]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut builder = CatalogBuilder::new(&temp_dir.path().join("Library.lrcat"));
        for (record_id, base_name) in photos {
            builder = builder.photo(*record_id, base_name);
        }
        let catalog_path = builder.build();
        let dirs = PreviewDirs::for_catalog(&catalog_path);
        std::fs::create_dir_all(&dirs.previews).expect("Failed to create preview folder");

        Self {
            temp_dir,
            catalog_path,
            dirs,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `<previews>/<first char>/<stem>.lrprev` as a plain JPEG.
    pub fn add_preview(&self, stem: &str, width: u32, height: u32) -> PathBuf {
        let shard = self.dirs.previews.join(&stem[..1]);
        std::fs::create_dir_all(&shard).unwrap();
        let path = shard.join(format!("{}.lrprev", stem));
        std::fs::write(&path, jpeg_bytes(width, height)).unwrap();
        path
    }

    pub fn tag_processed(&self, record_id: i64) {
        let conn = self.connect();
        conn.execute(
            "INSERT INTO AgLibraryKeyword (name, lc_name, includeOnExport, id_global)
             SELECT 'AI_Processed', 'ai_processed', 1, 'SEEDED'
             WHERE NOT EXISTS (SELECT 1 FROM AgLibraryKeyword WHERE name = 'AI_Processed')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO AgLibraryKeywordImage (image, tag)
             SELECT ?1, id_local FROM AgLibraryKeyword WHERE name = 'AI_Processed'",
            params![record_id],
        )
        .unwrap();
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        let mut name = self.catalog_path.clone().into_os_string();
        name.push(".checkpoint.json");
        PathBuf::from(name)
    }

    pub fn write_checkpoint(&self, ids: &[i64]) {
        std::fs::write(self.checkpoint_path(), serde_json::to_string(ids).unwrap()).unwrap();
    }

    pub fn checkpoint_ids(&self) -> Vec<i64> {
        let content = std::fs::read_to_string(self.checkpoint_path()).expect("No checkpoint written");
        let mut ids: Vec<i64> = serde_json::from_str(&content).unwrap();
        ids.sort_unstable();
        ids
    }

    pub fn linked_keywords(&self, record_id: i64) -> Vec<String> {
        let conn = self.connect();
        let mut stmt = conn
            .prepare(
                "SELECT k.name FROM AgLibraryKeywordImage ki
                 JOIN AgLibraryKeyword k ON ki.tag = k.id_local
                 WHERE ki.image = ?1 ORDER BY k.name",
            )
            .unwrap();
        stmt.query_map(params![record_id], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    pub fn rating(&self, record_id: i64) -> Option<f64> {
        self.connect()
            .query_row(
                "SELECT rating FROM Adobe_images WHERE id_local = ?1",
                params![record_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    pub fn caption(&self, record_id: i64) -> Option<String> {
        self.connect()
            .query_row(
                "SELECT caption FROM Adobe_images WHERE id_local = ?1",
                params![record_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    pub fn enricher(&self, config: &Config, analyzer: Arc<dyn ImageAnalyzer>) -> Enricher {
        Enricher::open_with_analyzer(&self.catalog_path, config, analyzer)
            .expect("Failed to open catalog")
            .with_progress(Arc::new(NoopProgress))
    }

    fn connect(&self) -> Connection {
        Connection::open(&self.catalog_path).expect("Failed to open catalog")
    }
}
