use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

/// Files sampled per sub-directory when detecting suffix patterns.
const PATTERN_SAMPLE_PER_DIR: usize = 10;

/// Lower-cased file name → every absolute path carrying that name.
///
/// Built by a single walk and never patched afterwards; a new index is built
/// when the directory tree is expected to have changed.
#[derive(Debug, Default)]
pub struct PreviewIndex {
    root: PathBuf,
    entries: HashMap<String, Vec<PathBuf>>,
    file_count: usize,
}

impl PreviewIndex {
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..Self::default()
        }
    }

    /// Walks `root` once. Catalog databases (`*.db`) are skipped.
    pub fn build(root: &Path) -> Self {
        if !root.is_dir() {
            warn!("Preview directory not found: {}", root.display());
            return Self::empty(root);
        }

        let mut entries: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let mut file_count = 0;

        for entry in WalkDir::new(root).into_iter().filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("Skipping unreadable entry during preview walk: {}", err);
                None
            }
        }) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if name.ends_with(".db") {
                continue;
            }
            entries.entry(name).or_default().push(entry.into_path());
            file_count += 1;
        }

        for paths in entries.values_mut() {
            paths.sort();
        }

        info!(
            "Indexed {} preview files ({} distinct names) under {}",
            file_count,
            entries.len(),
            root.display()
        );

        Self {
            root: root.to_path_buf(),
            entries,
            file_count,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of distinct file names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Paths whose file name equals `name` (case-insensitive).
    pub fn exact(&self, name: &str) -> &[PathBuf] {
        self.entries
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All indexed names and their paths.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.entries
            .iter()
            .map(|(name, paths)| (name.as_str(), paths.as_slice()))
    }

    /// Paths whose lower-cased file name satisfies `predicate`.
    pub fn matching<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a PathBuf> + 'a
    where
        F: Fn(&str) -> bool + 'a,
    {
        self.entries
            .iter()
            .filter(move |(name, _)| predicate(name.as_str()))
            .flat_map(|(_, paths)| paths.iter())
    }

    /// Paths whose file name contains `needle` (case-insensitive).
    pub fn containing<'a>(&'a self, needle: &str) -> impl Iterator<Item = &'a PathBuf> + 'a {
        let needle = needle.to_lowercase();
        self.matching(move |name| name.contains(&needle))
    }

    /// Detects `_<digits>` suffix conventions from file stems in sub-directories,
    /// sampling at most ten files per directory.
    pub fn detect_suffix_patterns(&self) -> Vec<String> {
        let mut sampled: HashMap<&Path, usize> = HashMap::new();
        let mut patterns = BTreeSet::new();

        let mut paths: Vec<&PathBuf> = self.entries.values().flatten().collect();
        paths.sort();

        for path in paths {
            let Some(parent) = path.parent() else { continue };
            if parent == self.root {
                continue;
            }
            let seen = sampled.entry(parent).or_insert(0);
            if *seen >= PATTERN_SAMPLE_PER_DIR {
                continue;
            }
            *seen += 1;

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some((_, last)) = stem.rsplit_once('_') {
                if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
                    patterns.insert(format!("_{}", last));
                }
            }
        }

        if !patterns.is_empty() {
            debug!("Detected preview suffix patterns: {:?}", patterns);
        }
        patterns.into_iter().collect()
    }
}
