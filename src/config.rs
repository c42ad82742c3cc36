//! Explicit settings handed to component constructors.
//!
//! Nothing here reads the environment; binaries fill these structs from
//! their parsed CLI (which itself falls back to env vars).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "amazon.titan-embed-text-v2:0";
/// Default region for both services.
pub const DEFAULT_REGION: &str = "ap-northeast-1";
/// Output dimension requested during corpus ingestion.
pub const DEFAULT_INGEST_DIMENSIONS: usize = 1024;
/// Per-request vector cap for uploads.
pub const DEFAULT_MAX_BATCH_VECTORS: usize = 500;
/// Per-request serialized payload cap for uploads.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Settings for the embedding service client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderConfig {
    /// Service region; used to derive the endpoint when none is given.
    pub region: Option<String>,
    /// Explicit endpoint base URL.
    pub endpoint: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Requested output dimension. `None` leaves it to the model default.
    pub dimensions: Option<usize>,
    /// Bearer token, when the endpoint needs one.
    pub api_key: Option<String>,
    /// Per-call deadline.
    pub timeout: Duration,
    /// Extra attempts after a throttled or 5xx response. Zero disables retries.
    pub max_retries: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            region: Some(DEFAULT_REGION.to_string()),
            endpoint: None,
            model: DEFAULT_EMBED_MODEL.to_string(),
            dimensions: None,
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 0,
        }
    }
}

impl EmbedderConfig {
    /// Endpoint base URL, without a trailing slash.
    pub fn resolve_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = non_blank(self.endpoint.as_deref()) {
            ensure_http(endpoint, "embedding endpoint")?;
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        match non_blank(self.region.as_deref()) {
            Some(region) => Ok(format!("https://bedrock-runtime.{region}.amazonaws.com")),
            None => Err(PipelineError::ConfigurationError(
                "embedding region or endpoint must be set (BEDROCK_REGION / BEDROCK_ENDPOINT)"
                    .into(),
            )),
        }
    }

    /// Checks every required setting.
    pub fn validate(&self) -> Result<()> {
        self.resolve_endpoint()?;
        if self.model.trim().is_empty() {
            return Err(PipelineError::ConfigurationError(
                "embedding model must be set (BEDROCK_EMBED_MODEL)".into(),
            ));
        }
        if self.dimensions == Some(0) {
            return Err(PipelineError::ConfigurationError(
                "embedding dimensions must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for the vector-store client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorStoreConfig {
    /// Service region; used to derive the endpoint when none is given.
    pub region: Option<String>,
    /// Explicit endpoint base URL.
    pub endpoint: Option<String>,
    /// Bucket (namespace) holding the index.
    pub bucket: Option<String>,
    /// Index name.
    pub index: Option<String>,
    /// Bearer token, when the endpoint needs one.
    pub token: Option<String>,
    /// Per-call deadline.
    pub timeout: Duration,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            bucket: None,
            index: None,
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl VectorStoreConfig {
    /// Endpoint base URL, without a trailing slash.
    pub fn resolve_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = non_blank(self.endpoint.as_deref()) {
            ensure_http(endpoint, "vector store endpoint")?;
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        match non_blank(self.region.as_deref()) {
            Some(region) => Ok(format!("https://s3vectors.{region}.api.aws")),
            None => Err(PipelineError::ConfigurationError(
                "vector store region or endpoint must be set (S3_VECTORS_REGION / S3_VECTORS_ENDPOINT)"
                    .into(),
            )),
        }
    }

    /// Bucket and index the pipeline targets.
    pub fn location(&self) -> Result<IndexLocation> {
        IndexLocation::new(
            self.bucket.as_deref().unwrap_or_default(),
            self.index.as_deref().unwrap_or_default(),
        )
    }

    /// Checks every required setting.
    pub fn validate(&self) -> Result<()> {
        self.resolve_endpoint()?;
        self.location().map(|_| ())
    }
}

/// Bucket plus index pair addressing one vector index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexLocation {
    bucket: String,
    index: String,
}

impl IndexLocation {
    /// Fails with `ConfigurationError` when either part is blank.
    pub fn new(bucket: impl Into<String>, index: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let index = index.into();
        let mut missing = Vec::new();
        if bucket.trim().is_empty() {
            missing.push("VECTOR_BUCKET_NAME");
        }
        if index.trim().is_empty() {
            missing.push("VECTOR_INDEX_NAME");
        }
        if !missing.is_empty() {
            return Err(PipelineError::ConfigurationError(format!(
                "required settings are not set ({})",
                missing.join(", ")
            )));
        }
        Ok(Self { bucket, index })
    }

    /// Bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Index name.
    pub fn index(&self) -> &str {
        &self.index
    }
}

/// Chunking bounds for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Maximum vectors in one request.
    pub max_vectors: usize,
    /// Maximum serialized request size in bytes.
    pub max_payload_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_vectors: DEFAULT_MAX_BATCH_VECTORS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Checkpoint directories for stages 1 to 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayout {
    /// Raw corpus documents.
    pub corpus: PathBuf,
    /// Stage 1 output.
    pub embedded: PathBuf,
    /// Stage 2 output.
    pub vector_input: PathBuf,
}

impl Default for PipelineLayout {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("articles"),
            embedded: PathBuf::from("articles-embed"),
            vector_input: PathBuf::from("articles-vectors"),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn ensure_http(endpoint: &str, what: &str) -> Result<()> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(PipelineError::ConfigurationError(format!(
            "{what} must be an http(s) URL, got {endpoint}"
        )))
    }
}
