//! Bedrock-style `InvokeModel` embedding client.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{validate_text, Embedder};
use crate::config::EmbedderConfig;
use crate::error::{PipelineError, Result};

const RESPONSE_EXCERPT_CHARS: usize = 300;

/// Blocking client that posts `{inputText, dimensions}` to
/// `{endpoint}/model/{model}/invoke` and reads back `{embedding: [...]}`.
#[derive(Clone)]
pub struct BedrockEmbedder {
    client: Client,
    invoke_url: String,
    dimensions: Option<usize>,
    max_retries: usize,
}

impl BedrockEmbedder {
    /// Builds a client from validated settings.
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.resolve_endpoint()?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let auth = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                PipelineError::ConfigurationError("invalid embedding API key".into())
            })?;
            headers.insert(AUTHORIZATION, auth);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                PipelineError::ConfigurationError(format!(
                    "failed to build embedding HTTP client: {err}"
                ))
            })?;
        let invoke_url = format!("{endpoint}/model/{}/invoke", config.model.trim());
        Ok(Self {
            client,
            invoke_url,
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    /// Dimension requested from the model, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn invoke(&self, text: &str) -> Result<Vec<f64>> {
        let request = InvokeRequest {
            input_text: text,
            dimensions: self.dimensions,
        };
        let mut attempt = 0usize;
        loop {
            let response = self
                .client
                .post(&self.invoke_url)
                .json(&request)
                .send()
                .map_err(|err| PipelineError::from_transport("embedding request failed", err))?;
            let status = response.status();
            if status.is_success() {
                let body = response.bytes().map_err(|err| {
                    PipelineError::from_transport("failed to read embedding response", err)
                })?;
                debug!(bytes = body.len(), "embedding response received");
                return parse_embedding(&body, self.dimensions);
            }
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            if should_retry(status) && attempt < self.max_retries {
                attempt += 1;
                let backoff = retry_backoff(attempt);
                warn!(%status, attempt, ?backoff, "embedding request throttled; retrying");
                thread::sleep(backoff);
                continue;
            }
            return Err(PipelineError::UpstreamError(format!(
                "embedding request failed ({status}): {}",
                excerpt(&body)
            )));
        }
    }
}

impl Embedder for BedrockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let text = validate_text(text)?;
        self.invoke(text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest<'a> {
    input_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// Pulls the `embedding` array out of a model response body.
pub(crate) fn parse_embedding(body: &[u8], expected_dim: Option<usize>) -> Result<Vec<f64>> {
    let raw = String::from_utf8_lossy(body);
    let value: Value = serde_json::from_slice(body).map_err(|err| {
        PipelineError::MalformedResponse(format!(
            "embedding response is not JSON ({err}): {}",
            excerpt(&raw)
        ))
    })?;
    let values = match value.get("embedding") {
        Some(Value::Array(values)) if !values.is_empty() => values,
        _ => {
            return Err(PipelineError::MalformedResponse(format!(
                "unexpected embedding response: {}",
                excerpt(&raw)
            )))
        }
    };
    let embedding = values
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| {
            PipelineError::MalformedResponse("embedding array holds non-numeric values".into())
        })?;
    if let Some(dim) = expected_dim {
        if embedding.len() != dim {
            return Err(PipelineError::MalformedResponse(format!(
                "expected {dim} embedding values, got {}",
                embedding.len()
            )));
        }
    }
    Ok(embedding)
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(RESPONSE_EXCERPT_CHARS).collect()
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}
