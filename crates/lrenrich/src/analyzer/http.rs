use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use super::AnalyzerError;
use crate::sanitize::redact_url;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

pub(crate) fn build_client(timeout_secs: u64) -> Result<Client, AnalyzerError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(AnalyzerError::from)
}

fn is_transient(error: &AnalyzerError) -> bool {
    match error {
        AnalyzerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        AnalyzerError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

fn post_once(
    client: &Client,
    url: &str,
    body: &Value,
    api_key: Option<&SecretString>,
) -> Result<Value, AnalyzerError> {
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key.expose_secret());
    }

    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(AnalyzerError::Status {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    Ok(response.json()?)
}

/// POSTs `body` as JSON, retrying transport failures, 429 and 5xx answers
/// with exponential backoff. `max_retries` counts retries after the first try.
pub(crate) fn post_json_with_retry(
    client: &Client,
    url: &str,
    body: &Value,
    api_key: Option<&SecretString>,
    max_retries: u32,
) -> Result<Value, AnalyzerError> {
    let mut attempt = 0;
    loop {
        match post_once(client, url, body, api_key) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && is_transient(&e) => {
                let delay = BACKOFF_BASE
                    .saturating_mul(2u32.saturating_pow(attempt))
                    .min(BACKOFF_CAP);
                warn!(
                    url = %redact_url(url),
                    attempt = attempt + 1,
                    "Analysis request failed, retrying in {:?}: {}",
                    delay,
                    e
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                debug!(url = %redact_url(url), "Analysis request failed: {}", e);
                return Err(e);
            }
        }
    }
}
