//! Finding rendered previews on disk.

pub mod cache;
pub mod index;
pub mod locator;
pub mod preview_db;
pub mod rank;

pub use cache::{CacheStats, LocationCache};
pub use index::PreviewIndex;
pub use locator::{
    format_global_id, name_hash, LocateStrategy, LocatorOptions, PreviewDirs, PreviewLocator,
    ScanSummary,
};
pub use preview_db::PreviewDatabase;
pub use rank::{best_candidate, rank_path, ResolutionRank};
