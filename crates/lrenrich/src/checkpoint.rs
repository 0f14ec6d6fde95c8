//! Durable set of record ids that have already been processed.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

pub const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";

/// One JSON file per catalog holding a sorted list of record ids.
///
/// Every failure is logged and swallowed; callers never see an error.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    enabled: bool,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// `<catalog path>.checkpoint.json`.
    pub fn for_catalog(catalog_path: &Path, enabled: bool) -> Self {
        let mut name = OsString::from(catalog_path.as_os_str());
        name.push(CHECKPOINT_SUFFIX);
        Self::new(PathBuf::from(name), enabled)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Empty when disabled, missing, or unreadable.
    pub fn load(&self) -> HashSet<i64> {
        if !self.enabled {
            return HashSet::new();
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return HashSet::new();
            }
            Err(e) => {
                warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                return HashSet::new();
            }
        };

        match serde_json::from_str::<Vec<i64>>(&content) {
            Ok(ids) => {
                info!("Loaded checkpoint with {} processed records", ids.len());
                ids.into_iter().collect()
            }
            Err(e) => {
                warn!(
                    "Ignoring corrupt checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                HashSet::new()
            }
        }
    }

    /// Rewrites the whole file through a sibling temp file.
    pub fn save(&self, ids: &HashSet<i64>) -> bool {
        if !self.enabled {
            return false;
        }
        let mut sorted: Vec<i64> = ids.iter().copied().collect();
        sorted.sort_unstable();

        let json = match serde_json::to_string(&sorted) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize checkpoint: {}", e);
                return false;
            }
        };

        let mut tmp_name = OsString::from(self.path.as_os_str());
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let written = std::fs::write(&tmp, json).and_then(|_| std::fs::rename(&tmp, &self.path));
        match written {
            Ok(()) => {
                debug!("Checkpoint saved: {} records", sorted.len());
                true
            }
            Err(e) => {
                warn!("Failed to save checkpoint {}: {}", self.path.display(), e);
                let _ = std::fs::remove_file(&tmp);
                false
            }
        }
    }

    /// Deletes the checkpoint file. `true` when a file was removed.
    pub fn clear(&self) -> bool {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Checkpoint cleared: {}", self.path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to clear checkpoint {}: {}", self.path.display(), e);
                false
            }
        }
    }
}
