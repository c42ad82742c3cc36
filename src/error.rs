//! Error taxonomy shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure a stage can surface. Any variant aborts the current run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input directory is missing.
    #[error("directory not found: {}", path.display())]
    DirectoryNotFound {
        /// Directory that was requested.
        path: PathBuf,
    },

    /// Input directory holds no recognised record files.
    #[error("no json files found in directory: {}", path.display())]
    EmptyInput {
        /// Directory that was scanned.
        path: PathBuf,
    },

    /// A record file is missing a required field or carries the wrong type.
    #[error("invalid record {file}: field `{field}` {reason}")]
    SchemaError {
        /// Offending file name.
        file: String,
        /// Field that failed validation.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Caller handed an unusable value to a component.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Upstream service answered with an unexpected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Upstream service or transport failure.
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// Upstream call exceeded its deadline.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Required setting is missing.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A single vector record cannot fit in one upload request.
    #[error("vector `{id}` serializes to {bytes} bytes, over the {limit} byte request limit")]
    PayloadTooLarge {
        /// Vector id.
        id: String,
        /// Serialized size.
        bytes: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Filesystem failure.
    #[error("io error at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid JSON.
    #[error("invalid json in {}: {source}", path.display())]
    Json {
        /// File being parsed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub(crate) fn schema(
        file: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaError {
            file: file.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a reqwest transport error onto the timeout/upstream split.
    pub(crate) fn from_transport(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(format!("{context}: {err}"))
        } else {
            Self::UpstreamError(format!("{context}: {err}"))
        }
    }

    /// Prefixes upstream failures with the record file they were raised for.
    pub(crate) fn in_file(self, file: &str) -> Self {
        match self {
            Self::MalformedResponse(detail) => Self::MalformedResponse(format!("{file}: {detail}")),
            Self::UpstreamError(detail) => Self::UpstreamError(format!("{file}: {detail}")),
            Self::UpstreamTimeout(detail) => Self::UpstreamTimeout(format!("{file}: {detail}")),
            other => other,
        }
    }

    /// True for per-record failures (bad JSON or a failed field check), the
    /// only kinds `--skip-invalid` may pass over.
    pub fn is_record_error(&self) -> bool {
        matches!(self, Self::SchemaError { .. } | Self::Json { .. })
    }
}
