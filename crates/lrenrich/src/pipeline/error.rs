use thiserror::Error;

use super::Stage;
use crate::analyzer::AnalyzerError;
use crate::catalog::DatabaseError;
use crate::decoder::DecodeError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No preview found for '{base_name}'")]
    NotFound { base_name: String },

    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Preparing image for analysis failed: {0}")]
    Prepare(#[source] image::ImageError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalyzerError),

    #[error("Analyzer returned no result")]
    NoResult,

    #[error("Writing metadata failed: {0}")]
    Persist(#[source] DatabaseError),
}

impl PipelineError {
    /// The step this error terminated the item at.
    pub fn stage(&self) -> Stage {
        match self {
            Self::NotFound { .. } => Stage::Located,
            Self::Decode(_) => Stage::Decoded,
            Self::Prepare(_) => Stage::Prepared,
            Self::Analysis(_) | Self::NoResult => Stage::Analyzed,
            Self::Persist(_) => Stage::Persisted,
        }
    }
}
