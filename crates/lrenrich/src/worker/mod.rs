pub mod job;
pub mod pool;

pub use job::{process_guarded, ProcessingResult};
pub use pool::WorkerPool;
