use std::path::{Path, PathBuf};

use crate::catalog::CatalogSettings;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::preview::{LocatorOptions, PreviewDirs};

const MIB: u64 = 1024 * 1024;

/// Run settings resolved once from [`Config`] for one catalog.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub catalog_path: PathBuf,
    pub preview_dirs: PreviewDirs,
    pub checkpoint_path: PathBuf,
    pub use_checkpoint: bool,
    pub checkpoint_interval: usize,
    pub batch_size: usize,
    pub worker_count: usize,
    pub max_images: Option<usize>,
    /// `0` disables the memory valve.
    pub memory_limit_bytes: u64,
    pub memory_pressure_ratio: f64,
    pub preview_max_resolution: u32,
    pub jpeg_quality: u8,
    pub locator: LocatorOptions,
    pub catalog: CatalogSettings,
}

impl PipelineConfig {
    pub fn from_config(config: &Config, catalog_path: &Path) -> Self {
        Self {
            catalog_path: catalog_path.to_path_buf(),
            preview_dirs: PreviewDirs::for_catalog(catalog_path),
            checkpoint_path: CheckpointStore::for_catalog(catalog_path, config.use_checkpoint)
                .path()
                .to_path_buf(),
            use_checkpoint: config.use_checkpoint,
            checkpoint_interval: config.checkpoint_interval.max(1),
            batch_size: config.batch_size.max(1),
            worker_count: config.worker_count().max(1),
            max_images: config.max_images.filter(|&n| n > 0),
            memory_limit_bytes: config.memory_limit_mb.saturating_mul(MIB),
            memory_pressure_ratio: config.memory_pressure_ratio,
            preview_max_resolution: config.preview_max_resolution,
            jpeg_quality: config.jpeg_quality,
            locator: LocatorOptions::from_config(config),
            catalog: CatalogSettings::from_config(config),
        }
    }

    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::new(&self.checkpoint_path, self.use_checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_resolves_paths() {
        let config = Config {
            max_workers: 4,
            memory_limit_mb: 2,
            max_images: Some(0),
            ..Config::default()
        };
        let settings = PipelineConfig::from_config(&config, Path::new("/lib/Main.lrcat"));

        assert_eq!(
            settings.preview_dirs.previews,
            PathBuf::from("/lib/Main Previews.lrdata")
        );
        assert_eq!(
            settings.checkpoint_path,
            PathBuf::from("/lib/Main.lrcat.checkpoint.json")
        );
        assert_eq!(settings.worker_count, 4);
        assert_eq!(settings.memory_limit_bytes, 2 * 1024 * 1024);
        assert_eq!(settings.max_images, None);
    }
}
