pub mod config;
pub mod error;
pub mod progress;
pub mod runner;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRecord;
use crate::worker::ProcessingResult;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::ImagePipeline;

/// Step an item reached (on success) or failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Located,
    Decoded,
    Prepared,
    Analyzed,
    Persisted,
    Exception,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Located => "located",
            Self::Decoded => "decoded",
            Self::Prepared => "prepared",
            Self::Analyzed => "analyzed",
            Self::Persisted => "persisted",
            Self::Exception => "exception",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processes one catalog record to completion. Implementations report every
/// failure through the returned result rather than by returning early.
pub trait ItemProcessor: Send + Sync {
    fn process(&self, record: &CatalogRecord) -> ProcessingResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Analyzed).unwrap(), "\"analyzed\"");
        assert_eq!(Stage::Exception.to_string(), "exception");
    }
}
