use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use md5::{Digest, Md5};
use serde::Serialize;

use super::cache::{CacheStats, LocationCache};
use super::index::PreviewIndex;
use super::preview_db::PreviewDatabase;
use super::rank::best_candidate;
use crate::catalog::{CatalogRecord, CatalogSchema};
use crate::config::Config;

const SCAN_PROGRESS_EVERY: usize = 100;

/// Preview directories Lightroom keeps next to a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDirs {
    pub previews: PathBuf,
    pub smart_previews: PathBuf,
}

impl PreviewDirs {
    /// `<dir>/<stem> Previews.lrdata` and `<dir>/<stem> Smart Previews.lrdata`.
    pub fn for_catalog(catalog_path: &Path) -> Self {
        let dir = catalog_path.parent().unwrap_or_else(|| Path::new("."));
        let stem = catalog_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            previews: dir.join(format!("{} Previews.lrdata", stem)),
            smart_previews: dir.join(format!("{} Smart Previews.lrdata", stem)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateStrategy {
    FileGlobalId,
    PreviewDatabase,
    ImageGlobalId,
    BaseName,
    KnownPattern,
    NameHash,
    SmartPreview,
    Original,
}

impl LocateStrategy {
    /// Order in which strategies are tried; the first hit wins.
    pub const ORDER: [Self; 8] = [
        Self::FileGlobalId,
        Self::PreviewDatabase,
        Self::ImageGlobalId,
        Self::BaseName,
        Self::KnownPattern,
        Self::NameHash,
        Self::SmartPreview,
        Self::Original,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FileGlobalId => "file_global_id",
            Self::PreviewDatabase => "preview_database",
            Self::ImageGlobalId => "image_global_id",
            Self::BaseName => "base_name",
            Self::KnownPattern => "known_pattern",
            Self::NameHash => "name_hash",
            Self::SmartPreview => "smart_preview",
            Self::Original => "original",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocatorOptions {
    pub deep_search: bool,
    pub use_smart_previews: bool,
    pub use_original_if_no_preview: bool,
    pub use_preview_db: bool,
    pub use_id_global: bool,
    pub known_patterns: Vec<String>,
}

impl LocatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            deep_search: config.deep_search,
            use_smart_previews: config.use_smart_previews,
            use_original_if_no_preview: config.use_original_if_no_preview,
            use_preview_db: config.use_preview_db,
            use_id_global: config.use_id_global,
            known_patterns: config.known_preview_patterns.clone(),
        }
    }
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub found: usize,
}

/// Canonical dashed, lower-cased form of a global id. 32 bare hex digits are
/// regrouped `8-4-4-4-12`; anything else is only lower-cased.
pub fn format_global_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    if id.is_empty() {
        return None;
    }
    if id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(
            format!(
                "{}-{}-{}-{}-{}",
                &id[0..8],
                &id[8..12],
                &id[12..16],
                &id[16..20],
                &id[20..32]
            )
            .to_lowercase(),
        );
    }
    Some(id.to_lowercase())
}

/// Hex MD5 of the base name, as used by hash-named preview files.
pub fn name_hash(base_name: &str) -> String {
    format!("{:x}", Md5::digest(base_name.as_bytes()))
}

/// Finds the preview file for a catalog record.
///
/// Indexes are built once at construction. Located paths are cached per
/// `(record_id, base_name)`; a cache hit runs no strategy at all.
pub struct PreviewLocator {
    dirs: PreviewDirs,
    options: LocatorOptions,
    index: PreviewIndex,
    smart_index: PreviewIndex,
    preview_db: Option<PreviewDatabase>,
    cache: LocationCache,
    attempts: AtomicU64,
}

impl PreviewLocator {
    pub fn new(dirs: PreviewDirs, options: LocatorOptions) -> Self {
        let index = PreviewIndex::build(&dirs.previews);
        let smart_index = if options.use_smart_previews {
            PreviewIndex::build(&dirs.smart_previews)
        } else {
            PreviewIndex::empty(&dirs.smart_previews)
        };
        let preview_db = if options.use_preview_db {
            PreviewDatabase::locate(&dirs.previews)
        } else {
            None
        };
        if let Some(db) = &preview_db {
            debug!("Using preview database {}", db.path().display());
        }

        Self {
            dirs,
            options,
            index,
            smart_index,
            preview_db,
            cache: LocationCache::new(),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn dirs(&self) -> &PreviewDirs {
        &self.dirs
    }

    pub fn options(&self) -> &LocatorOptions {
        &self.options
    }

    pub fn index(&self) -> &PreviewIndex {
        &self.index
    }

    /// Adapts the strategy set to what the catalog and preview tree offer.
    pub fn optimize(&mut self, schema: &CatalogSchema) {
        if self.options.use_id_global && !schema.has_global_ids() {
            info!("Catalog has no global ids, disabling id-based preview search");
            self.options.use_id_global = false;
        }
        if self.options.known_patterns.is_empty() {
            let detected = self.index.detect_suffix_patterns();
            if !detected.is_empty() {
                info!("Using {} detected preview name patterns", detected.len());
                self.options.known_patterns = detected;
            }
        }
    }

    fn enabled(&self, strategy: LocateStrategy) -> bool {
        match strategy {
            LocateStrategy::FileGlobalId | LocateStrategy::ImageGlobalId => {
                self.options.use_id_global
            }
            LocateStrategy::PreviewDatabase => self.preview_db.is_some(),
            LocateStrategy::BaseName => true,
            LocateStrategy::KnownPattern => !self.options.known_patterns.is_empty(),
            LocateStrategy::NameHash => self.options.deep_search,
            LocateStrategy::SmartPreview => self.options.use_smart_previews,
            LocateStrategy::Original => self.options.use_original_if_no_preview,
        }
    }

    fn run_strategy(&self, strategy: LocateStrategy, record: &CatalogRecord) -> Option<PathBuf> {
        match strategy {
            LocateStrategy::FileGlobalId => self.by_global_id(record.file_global_id.as_deref()),
            LocateStrategy::PreviewDatabase => self.by_preview_db(record),
            LocateStrategy::ImageGlobalId => self.by_global_id(record.image_global_id.as_deref()),
            LocateStrategy::BaseName => self.by_base_name(record),
            LocateStrategy::KnownPattern => self.by_pattern(record),
            LocateStrategy::NameHash => self.by_name_hash(record),
            LocateStrategy::SmartPreview => self.by_smart_preview(record),
            LocateStrategy::Original => by_original(record),
        }
    }

    /// Returns the preview path for `record`, or `None` when every enabled
    /// strategy comes up empty.
    pub fn locate(&self, record: &CatalogRecord) -> Option<PathBuf> {
        if let Some(path) = self.cache.get(record.record_id, &record.base_name) {
            return Some(path);
        }

        for strategy in LocateStrategy::ORDER {
            if !self.enabled(strategy) {
                continue;
            }
            self.attempts.fetch_add(1, Ordering::Relaxed);
            if let Some(path) = self.run_strategy(strategy, record) {
                debug!(
                    "Preview for {} ({}) found by {}: {}",
                    record.base_name,
                    record.record_id,
                    strategy.name(),
                    path.display()
                );
                self.cache
                    .insert(record.record_id, &record.base_name, path.clone());
                return Some(path);
            }
        }

        warn!(
            "No preview found for {} (record {})",
            record.base_name, record.record_id
        );
        None
    }

    fn by_global_id(&self, id: Option<&str>) -> Option<PathBuf> {
        let id = format_global_id(id?)?;
        best_candidate(self.index.containing(&id))
    }

    fn by_preview_db(&self, record: &CatalogRecord) -> Option<PathBuf> {
        let db = self.preview_db.as_ref()?;
        match db.preview_uuid(record.record_id) {
            Ok(Some(uuid)) => best_candidate(self.index.containing(&uuid)),
            Ok(None) => None,
            Err(e) => {
                debug!("Preview database lookup failed for {}: {}", record.record_id, e);
                None
            }
        }
    }

    fn by_base_name(&self, record: &CatalogRecord) -> Option<PathBuf> {
        let stem = record.stem().to_lowercase();
        if stem.is_empty() {
            return None;
        }
        let exact_stem = stem.clone();
        best_candidate(self.index.matching(move |name| {
            name.rsplit_once('.').map_or(name, |(s, _)| s) == exact_stem
        }))
        .or_else(|| best_candidate(self.index.containing(&stem)))
    }

    fn by_pattern(&self, record: &CatalogRecord) -> Option<PathBuf> {
        let stem = record.stem().to_lowercase();
        let file_id = record.file_id.to_string();
        self.options.known_patterns.iter().find_map(|pattern| {
            let pattern = pattern.to_lowercase();
            let (stem, file_id) = (stem.clone(), file_id.clone());
            best_candidate(self.index.matching(move |name| {
                name.contains(&pattern)
                    && ((!stem.is_empty() && name.contains(&stem)) || name.contains(&file_id))
            }))
        })
    }

    fn by_name_hash(&self, record: &CatalogRecord) -> Option<PathBuf> {
        best_candidate(self.index.containing(&name_hash(&record.base_name)))
    }

    fn by_smart_preview(&self, record: &CatalogRecord) -> Option<PathBuf> {
        let stem = record.stem().to_lowercase();
        if stem.is_empty() {
            return None;
        }
        let parts: Vec<String> = stem
            .split('-')
            .filter(|part| part.len() > 3)
            .map(str::to_string)
            .collect();

        best_candidate(self.smart_index.matching(move |name| {
            name.ends_with(".dng")
                && (name.contains(&stem) || parts.iter().any(|p| name.contains(p.as_str())))
        }))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops all cached locations, returning how many were removed.
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        info!("Cleared {} cached preview locations", removed);
        removed
    }

    /// Strategy executions since construction.
    pub fn strategy_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Locates previews for every record without decoding anything.
    pub fn scan(&self, records: &[CatalogRecord]) -> ScanSummary {
        let mut summary = ScanSummary {
            total: records.len(),
            found: 0,
        };
        for (i, record) in records.iter().enumerate() {
            if self.locate(record).is_some() {
                summary.found += 1;
            }
            if (i + 1) % SCAN_PROGRESS_EVERY == 0 {
                info!("Scanned {}/{} records, {} previews found", i + 1, summary.total, summary.found);
            }
        }
        info!(
            "Preview scan complete: {}/{} records have a preview",
            summary.found, summary.total
        );
        summary
    }
}

fn by_original(record: &CatalogRecord) -> Option<PathBuf> {
    let path = record.original_path();
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use std::collections::{HashMap, HashSet};

    const FILE_GID: &str = "0123456789ABCDEF0123456789ABCDEF";
    const FILE_GID_DASHED: &str = "01234567-89ab-cdef-0123-456789abcdef";

    fn record(base_name: &str) -> CatalogRecord {
        CatalogRecord {
            record_id: 42,
            file_id: 4242,
            base_name: base_name.to_string(),
            path_from_root: "2023/".to_string(),
            root_folder: PathBuf::from("/nonexistent/photos"),
            image_global_id: None,
            file_global_id: Some(FILE_GID.to_string()),
            capture_time: None,
        }
    }

    fn dirs(temp: &TempDir) -> PreviewDirs {
        PreviewDirs::for_catalog(&temp.path().join("Lib.lrcat"))
    }

    fn locator(temp: &TempDir, options: LocatorOptions) -> PreviewLocator {
        PreviewLocator::new(dirs(temp), options)
    }

    #[test]
    fn test_dirs_for_catalog() {
        let dirs = PreviewDirs::for_catalog(Path::new("/lib/My Catalog.lrcat"));
        assert_eq!(dirs.previews, PathBuf::from("/lib/My Catalog Previews.lrdata"));
        assert_eq!(
            dirs.smart_previews,
            PathBuf::from("/lib/My Catalog Smart Previews.lrdata")
        );
    }

    #[test]
    fn test_format_global_id() {
        assert_eq!(format_global_id(FILE_GID).as_deref(), Some(FILE_GID_DASHED));
        assert_eq!(format_global_id("ABC-DEF").as_deref(), Some("abc-def"));
        assert_eq!(format_global_id("  "), None);
    }

    #[test]
    fn test_global_id_beats_base_name() {
        let temp = TempDir::new().unwrap();
        let previews = temp.child("Lib Previews.lrdata");
        previews
            .child(format!("0/0123/{}-aaaa.lrprev", FILE_GID_DASHED))
            .touch()
            .unwrap();
        previews.child("1/IMG_0042.lrprev").touch().unwrap();

        let found = locator(&temp, LocatorOptions::default())
            .locate(&record("IMG_0042.CR2"))
            .unwrap();
        assert!(found.to_string_lossy().contains(FILE_GID_DASHED));
    }

    #[test]
    fn test_resolution_tie_break() {
        let temp = TempDir::new().unwrap();
        let previews = temp.child("Lib Previews.lrdata");
        for dir in ["a", "b", "c"] {
            let suffix = match dir {
                "a" => "_800",
                "b" => "_3200",
                _ => "_1600",
            };
            previews
                .child(format!("{}/{}{}.lrprev", dir, FILE_GID_DASHED, suffix))
                .touch()
                .unwrap();
        }

        let found = locator(&temp, LocatorOptions::default())
            .locate(&record("IMG_0042.CR2"))
            .unwrap();
        assert!(found.to_string_lossy().ends_with("_3200.lrprev"));
    }

    #[test]
    fn test_cache_hit_skips_strategies() {
        let temp = TempDir::new().unwrap();
        temp.child("Lib Previews.lrdata/x/IMG_0042.lrprev")
            .touch()
            .unwrap();
        let locator = locator(&temp, LocatorOptions::default());
        let rec = record("IMG_0042.CR2");

        let first = locator.locate(&rec).unwrap();
        let attempts = locator.strategy_attempts();
        assert!(attempts > 0);

        let second = locator.locate(&rec).unwrap();
        assert_eq!(first, second);
        assert_eq!(locator.strategy_attempts(), attempts);
        assert_eq!(locator.cache_stats().hits, 1);
    }

    #[test]
    fn test_base_name_prefers_exact_stem() {
        let temp = TempDir::new().unwrap();
        let previews = temp.child("Lib Previews.lrdata");
        previews.child("a/IMG_0042-edit.lrprev").touch().unwrap();
        previews.child("b/IMG_0042.lrprev").touch().unwrap();

        let mut rec = record("IMG_0042.CR2");
        rec.file_global_id = None;
        let found = locator(&temp, LocatorOptions::default())
            .locate(&rec)
            .unwrap();
        assert_eq!(found.file_name().unwrap(), "IMG_0042.lrprev");
    }

    #[test]
    fn test_known_pattern_needs_stem_or_file_id() {
        let temp = TempDir::new().unwrap();
        let previews = temp.child("Lib Previews.lrdata");
        previews.child("a/9999_thumb.jpg").touch().unwrap();
        previews.child("b/4242_thumb.jpg").touch().unwrap();

        let options = LocatorOptions {
            known_patterns: vec!["_thumb".to_string()],
            use_id_global: false,
            deep_search: false,
            ..LocatorOptions::default()
        };
        let found = locator(&temp, options).locate(&record("DSC1.NEF")).unwrap();
        assert_eq!(found.file_name().unwrap(), "4242_thumb.jpg");
    }

    #[test]
    fn test_name_hash_search() {
        let temp = TempDir::new().unwrap();
        let hash = name_hash("IMG_0042.CR2");
        temp.child(format!("Lib Previews.lrdata/f/{}.lrprev", hash))
            .touch()
            .unwrap();

        let mut rec = record("IMG_0042.CR2");
        rec.file_global_id = None;
        let found = locator(&temp, LocatorOptions::default()).locate(&rec).unwrap();
        assert!(found.to_string_lossy().contains(&hash));

        let shallow = LocatorOptions {
            deep_search: false,
            ..LocatorOptions::default()
        };
        assert!(locator(&temp, shallow).locate(&rec).is_none());
    }

    #[test]
    fn test_smart_preview_fallback() {
        let temp = TempDir::new().unwrap();
        temp.child("Lib Smart Previews.lrdata/1/Summer-Holiday-001.dng")
            .touch()
            .unwrap();
        temp.child("Lib Smart Previews.lrdata/1/Holiday.jpg")
            .touch()
            .unwrap();

        let mut rec = record("Holiday-2019.CR2");
        rec.file_global_id = None;
        let found = locator(&temp, LocatorOptions::default()).locate(&rec).unwrap();
        assert_eq!(found.file_name().unwrap(), "Summer-Holiday-001.dng");
    }

    #[test]
    fn test_original_fallback() {
        let temp = TempDir::new().unwrap();
        temp.child("photos/2023/IMG_0042.jpg").touch().unwrap();

        let mut rec = record("IMG_0042.jpg");
        rec.file_global_id = None;
        rec.root_folder = temp.path().join("photos");

        assert!(locator(&temp, LocatorOptions::default()).locate(&rec).is_none());

        let options = LocatorOptions {
            use_original_if_no_preview: true,
            ..LocatorOptions::default()
        };
        let found = locator(&temp, options).locate(&rec).unwrap();
        assert_eq!(found, rec.original_path());
    }

    #[test]
    fn test_not_found_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let locator = locator(&temp, LocatorOptions::default());
        let rec = record("missing.jpg");

        assert!(locator.locate(&rec).is_none());
        let after_first = locator.strategy_attempts();
        assert!(locator.locate(&rec).is_none());
        assert!(locator.strategy_attempts() > after_first);
        assert_eq!(locator.cache_stats().size, 0);
    }

    #[test]
    fn test_optimize_without_global_ids() {
        let temp = TempDir::new().unwrap();
        temp.child("Lib Previews.lrdata/a/b/photo_2048.lrprev")
            .touch()
            .unwrap();
        let mut locator = locator(&temp, LocatorOptions::default());

        let schema = CatalogSchema::new(HashMap::from([(
            "Adobe_images".to_string(),
            HashSet::from(["id_local".to_string()]),
        )]));
        locator.optimize(&schema);

        assert!(!locator.options().use_id_global);
        assert_eq!(locator.options().known_patterns, vec!["_2048"]);
    }

    #[test]
    fn test_clear_cache_and_scan() {
        let temp = TempDir::new().unwrap();
        temp.child("Lib Previews.lrdata/a/A.lrprev").touch().unwrap();
        let locator = locator(&temp, LocatorOptions::default());

        let mut found = record("A.jpg");
        found.file_global_id = None;
        let mut missing = record("B.jpg");
        missing.record_id = 43;
        missing.file_global_id = None;

        let summary = locator.scan(&[found, missing]);
        assert_eq!(summary, ScanSummary { total: 2, found: 1 });
        assert_eq!(locator.clear_cache(), 1);
        assert_eq!(locator.cache_stats().size, 0);
    }
}
