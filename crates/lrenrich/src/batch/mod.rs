//! Batch orchestration: filtering, dispatch, statistics and checkpoints.

pub mod memory;
pub mod processor;
pub mod stats;

pub use memory::{MemoryGuard, MemoryProbe, MemoryRelief, ProcessMemoryProbe};
pub use processor::BatchProcessor;
pub use stats::{lock_stats, ProcessingStats, RunReport, SharedStats};
