//! Seam to the external image-understanding service.
//!
//! The pipeline only knows [`ImageAnalyzer`]: one prepared image in, structured
//! metadata (or nothing) out. Concrete providers are a closed set selected
//! once by [`create_analyzer`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{AnalyzerConfig, AnalyzerProvider};

pub mod endpoint;
mod http;
pub mod json;
pub mod ollama;
pub mod prepare;

pub use endpoint::EndpointAnalyzer;
pub use json::extract_json;
pub use ollama::OllamaAnalyzer;
pub use prepare::{prepare_for_analysis, PreparedImage};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected service response: {0}")]
    ResponseParse(String),

    #[error("Invalid analyzer configuration: {0}")]
    Config(String),
}

/// Structured result of one image analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub aesthetic_score: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl AnalysisMetadata {
    /// Lenient conversion from a model's JSON answer: single strings count as
    /// one-element lists, numeric strings are accepted for the score, and
    /// unknown fields are ignored.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let categories = object
            .get("categories")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(key, values)| (key.clone(), string_list(Some(values))))
                    .filter(|(_, values)| !values.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let aesthetic_score = match object.get("aesthetic_score") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };

        Some(Self {
            keywords: string_list(object.get("keywords")),
            tags: string_list(object.get("tags")),
            categories,
            aesthetic_score: aesthetic_score.clamp(0.0, 10.0),
            description: object
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .filter(|d| !d.trim().is_empty()),
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// External image-understanding collaborator.
///
/// `Ok(None)` means the service answered but produced nothing usable; the
/// pipeline treats it the same way as an error at the `analyzed` stage.
pub trait ImageAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, image: &PreparedImage) -> Result<Option<AnalysisMetadata>, AnalyzerError>;
}

/// Builds the configured provider.
pub fn create_analyzer(config: &AnalyzerConfig) -> Result<Arc<dyn ImageAnalyzer>, AnalyzerError> {
    let analyzer: Arc<dyn ImageAnalyzer> = match config.provider {
        AnalyzerProvider::Ollama => Arc::new(OllamaAnalyzer::new(config)?),
        AnalyzerProvider::Endpoint => Arc::new(EndpointAnalyzer::new(config)?),
    };
    tracing::info!(
        provider = analyzer.name(),
        url = %crate::sanitize::redact_url(&config.api_url),
        "Image analyzer ready"
    );
    Ok(analyzer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full() {
        let value = json!({
            "keywords": ["beach", "sunset"],
            "tags": ["travel"],
            "categories": { "mood": ["calm"], "lighting": "golden hour", "empty": [] },
            "aesthetic_score": 7.5,
            "description": "A calm beach at sunset."
        });

        let meta = AnalysisMetadata::from_value(&value).unwrap();
        assert_eq!(meta.keywords, vec!["beach", "sunset"]);
        assert_eq!(meta.tags, vec!["travel"]);
        assert_eq!(meta.categories["mood"], vec!["calm"]);
        assert_eq!(meta.categories["lighting"], vec!["golden hour"]);
        assert!(!meta.categories.contains_key("empty"));
        assert!((meta.aesthetic_score - 7.5).abs() < f64::EPSILON);
        assert_eq!(meta.description.as_deref(), Some("A calm beach at sunset."));
    }

    #[test]
    fn test_from_value_lenient_score() {
        let meta = AnalysisMetadata::from_value(&json!({ "aesthetic_score": " 8.2 " })).unwrap();
        assert!((meta.aesthetic_score - 8.2).abs() < 1e-9);

        let clamped = AnalysisMetadata::from_value(&json!({ "aesthetic_score": 42 })).unwrap();
        assert!((clamped.aesthetic_score - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(AnalysisMetadata::from_value(&json!(["a", "b"])).is_none());
        assert!(AnalysisMetadata::from_value(&json!("text")).is_none());
    }

    #[test]
    fn test_metadata_serializes_for_storage() {
        let meta = AnalysisMetadata {
            keywords: vec!["dog".into()],
            aesthetic_score: 6.0,
            ..Default::default()
        };
        let text = serde_json::to_string(&meta).unwrap();
        let back: AnalysisMetadata = serde_json::from_str(&text).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_factory_selects_provider() {
        let mut config = AnalyzerConfig::default();
        assert_eq!(create_analyzer(&config).unwrap().name(), "ollama");

        config.provider = AnalyzerProvider::Endpoint;
        config.api_url = "http://localhost:9000/analyze".to_string();
        assert_eq!(create_analyzer(&config).unwrap().name(), "endpoint");
    }
}
