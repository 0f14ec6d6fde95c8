use reqwest::blocking::Client;
use secrecy::SecretString;
use serde_json::{json, Value};

use super::http::{build_client, post_json_with_retry};
use super::ollama::parse_generate_response;
use super::{AnalysisMetadata, AnalyzerError, ImageAnalyzer, PreparedImage};
use crate::config::AnalyzerConfig;

/// Generic JSON service: receives the base64 JPEG and answers either with the
/// metadata object itself or with `{"response": "<text containing JSON>"}`.
pub struct EndpointAnalyzer {
    client: Client,
    url: String,
    model: String,
    prompt: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl EndpointAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self, AnalyzerError> {
        if config.api_url.trim().is_empty() {
            return Err(AnalyzerError::Config("endpoint requires api_url".to_string()));
        }
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: config.api_url.clone(),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            api_key: config
                .api_key
                .as_ref()
                .filter(|k| !k.is_empty())
                .map(|k| SecretString::from(k.clone())),
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, image: &PreparedImage) -> Value {
        json!({
            "image": image.base64,
            "media_type": "image/jpeg",
            "model": self.model,
            "prompt": self.prompt,
        })
    }
}

pub(crate) fn parse_endpoint_response(reply: &Value) -> Result<Option<AnalysisMetadata>, AnalyzerError> {
    if reply.get("response").is_some_and(Value::is_string) {
        return parse_generate_response(reply);
    }
    if reply.is_null() {
        return Ok(None);
    }
    AnalysisMetadata::from_value(reply)
        .map(Some)
        .ok_or_else(|| AnalyzerError::ResponseParse("expected a JSON object".to_string()))
}

impl ImageAnalyzer for EndpointAnalyzer {
    fn name(&self) -> &str {
        "endpoint"
    }

    fn analyze(&self, image: &PreparedImage) -> Result<Option<AnalysisMetadata>, AnalyzerError> {
        let reply = post_json_with_retry(
            &self.client,
            &self.url,
            &self.request_body(image),
            self.api_key.as_ref(),
            self.max_retries,
        )?;
        parse_endpoint_response(&reply)
    }
}
