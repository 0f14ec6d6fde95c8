use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::warn;

use super::http::{build_client, post_json_with_retry};
use super::{extract_json, AnalysisMetadata, AnalyzerError, ImageAnalyzer, PreparedImage};
use crate::config::AnalyzerConfig;

/// Ollama `/api/generate` with a vision model.
pub struct OllamaAnalyzer {
    client: Client,
    endpoint: String,
    model: String,
    prompt: String,
    max_retries: u32,
}

impl OllamaAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self, AnalyzerError> {
        if config.model.trim().is_empty() {
            return Err(AnalyzerError::Config("ollama requires a model".to_string()));
        }
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: generate_endpoint(&config.api_url),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, image: &PreparedImage) -> Value {
        json!({
            "model": self.model,
            "prompt": self.prompt,
            "images": [image.base64],
            "stream": false,
        })
    }
}

fn generate_endpoint(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    if base.ends_with("/api/generate") {
        base.to_string()
    } else {
        format!("{}/api/generate", base)
    }
}

/// Extracts metadata from an `/api/generate` reply.
pub(crate) fn parse_generate_response(reply: &Value) -> Result<Option<AnalysisMetadata>, AnalyzerError> {
    let text = reply
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalyzerError::ResponseParse("missing 'response' field".to_string()))?;

    match extract_json(text) {
        Some(value) => Ok(AnalysisMetadata::from_value(&value)),
        None => {
            warn!("Model reply contained no JSON ({} chars)", text.len());
            Ok(None)
        }
    }
}

impl ImageAnalyzer for OllamaAnalyzer {
    fn name(&self) -> &str {
        "ollama"
    }

    fn analyze(&self, image: &PreparedImage) -> Result<Option<AnalysisMetadata>, AnalyzerError> {
        let reply = post_json_with_retry(
            &self.client,
            &self.endpoint,
            &self.request_body(image),
            None,
            self.max_retries,
        )?;
        parse_generate_response(&reply)
    }
}
