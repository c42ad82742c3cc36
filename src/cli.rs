//! Command-line argument groups shared by the binaries.
//!
//! Every option also reads an environment variable, so a `.env` file loaded
//! with `dotenvy` configures the whole pipeline.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use crate::config::{
    EmbedderConfig, PipelineLayout, UploadLimits, VectorStoreConfig, DEFAULT_EMBED_MODEL,
    DEFAULT_MAX_BATCH_VECTORS, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_REGION,
};
use crate::embedder::{BedrockEmbedder, CachedEmbedder, Embedder};
use crate::error::Result;
use crate::formatter::VectorFormatter;
use crate::stage::EmbedStageOptions;
use crate::vector_store::S3VectorsClient;

/// Embedding service options.
///
/// Field names carry an `embed_` prefix so the group can be flattened next to
/// [`VectorStoreArgs`] without clashing argument ids.
#[derive(Args, Debug, Clone)]
pub struct EmbedderArgs {
    /// Embedding service region
    #[arg(long, env = "BEDROCK_REGION", default_value = DEFAULT_REGION)]
    pub embed_region: String,

    /// Embedding endpoint override (e.g. a local gateway)
    #[arg(long, env = "BEDROCK_ENDPOINT")]
    pub embed_endpoint: Option<String>,

    /// Embedding model identifier
    #[arg(long, env = "BEDROCK_EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL)]
    pub embed_model: String,

    /// Bearer token sent to the embedding endpoint
    #[arg(long, env = "BEDROCK_API_KEY", hide_env_values = true)]
    pub embed_api_key: Option<String>,

    /// Requested embedding dimension
    #[arg(long, env = "EMBED_DIMENSIONS")]
    pub dimensions: Option<usize>,

    /// Seconds before an embedding call times out
    #[arg(long, env = "EMBED_TIMEOUT_SECS", default_value_t = 30)]
    pub embed_timeout_secs: u64,

    /// Retries after throttled or 5xx responses (0 = none)
    #[arg(long, env = "EMBED_MAX_RETRIES", default_value_t = 0)]
    pub embed_max_retries: usize,

    /// LRU cache entries for repeated texts (0 = disabled)
    #[arg(long, env = "EMBED_CACHE_SIZE", default_value_t = 0)]
    pub embed_cache_size: usize,
}

impl EmbedderArgs {
    /// Converts the parsed options into an `EmbedderConfig`.
    ///
    /// `default_dimensions` applies when `--dimensions` is not given.
    pub fn build_config(&self, default_dimensions: Option<usize>) -> EmbedderConfig {
        EmbedderConfig {
            region: Some(self.embed_region.clone()),
            endpoint: self.embed_endpoint.clone(),
            model: self.embed_model.clone(),
            dimensions: self.dimensions.or(default_dimensions),
            api_key: self.embed_api_key.clone(),
            timeout: Duration::from_secs(self.embed_timeout_secs),
            max_retries: self.embed_max_retries,
        }
    }

    /// Builds the HTTP embedder, wrapped in a cache when one is requested.
    pub fn build_embedder(&self, default_dimensions: Option<usize>) -> Result<Arc<dyn Embedder>> {
        let embedder = BedrockEmbedder::new(&self.build_config(default_dimensions))?;
        let embedder: Arc<dyn Embedder> = match NonZeroUsize::new(self.embed_cache_size) {
            Some(capacity) => Arc::new(CachedEmbedder::new(embedder, capacity)),
            None => Arc::new(embedder),
        };
        Ok(embedder)
    }
}

/// Vector store options.
#[derive(Args, Debug, Clone)]
pub struct VectorStoreArgs {
    /// Vector store region
    #[arg(long, env = "S3_VECTORS_REGION")]
    pub vector_region: Option<String>,

    /// Vector store endpoint override
    #[arg(long, env = "S3_VECTORS_ENDPOINT")]
    pub vector_endpoint: Option<String>,

    /// Bearer token sent to the vector store endpoint
    #[arg(long, env = "S3_VECTORS_TOKEN", hide_env_values = true)]
    pub vector_token: Option<String>,

    /// Vector bucket name
    #[arg(long, env = "VECTOR_BUCKET_NAME")]
    pub bucket: Option<String>,

    /// Vector index name
    #[arg(long, env = "VECTOR_INDEX_NAME")]
    pub index: Option<String>,

    /// Seconds before a vector store call times out
    #[arg(long, env = "VECTOR_TIMEOUT_SECS", default_value_t = 30)]
    pub vector_timeout_secs: u64,
}

impl VectorStoreArgs {
    /// Converts the parsed options into a `VectorStoreConfig`.
    pub fn build_config(&self) -> VectorStoreConfig {
        VectorStoreConfig {
            region: self.vector_region.clone(),
            endpoint: self.vector_endpoint.clone(),
            bucket: self.bucket.clone(),
            index: self.index.clone(),
            token: self.vector_token.clone(),
            timeout: Duration::from_secs(self.vector_timeout_secs),
        }
    }

    /// Builds the HTTP client; fails before any network call when settings
    /// are missing.
    pub fn build_client(&self) -> Result<S3VectorsClient> {
        S3VectorsClient::new(&self.build_config())
    }
}

/// Stage 2 options, shared by `sv-format` and `sv-pipeline`.
#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    /// Extra top-level fields copied into vector metadata, comma separated
    #[arg(long, env = "VECTOR_METADATA_FIELDS", value_delimiter = ',')]
    pub metadata_fields: Vec<String>,
}

impl FormatArgs {
    /// Formatter copying the requested fields; blank names are dropped.
    pub fn formatter(&self) -> VectorFormatter {
        VectorFormatter::with_passthrough(
            self.metadata_fields
                .iter()
                .map(|field| field.trim())
                .filter(|field| !field.is_empty()),
        )
    }
}

/// Upload chunking options.
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Maximum vectors per put request
    #[arg(long, env = "UPLOAD_MAX_BATCH", default_value_t = DEFAULT_MAX_BATCH_VECTORS)]
    pub max_batch: usize,

    /// Maximum serialized bytes per put request
    #[arg(long, env = "UPLOAD_MAX_PAYLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_payload_bytes: usize,
}

impl UploadArgs {
    /// Chunking bounds for the uploader.
    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_vectors: self.max_batch,
            max_payload_bytes: self.max_payload_bytes,
        }
    }
}

/// Stage 1 behaviour.
#[derive(Args, Debug, Clone)]
pub struct EmbedStageArgs {
    /// Concurrent embedding calls
    #[arg(long, env = "EMBED_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Skip documents that fail validation instead of aborting
    #[arg(long, env = "EMBED_SKIP_INVALID", default_value_t = false)]
    pub skip_invalid: bool,
}

impl EmbedStageArgs {
    /// Options for the embed stage.
    pub fn options(&self) -> EmbedStageOptions {
        EmbedStageOptions {
            workers: self.workers.max(1),
            skip_invalid: self.skip_invalid,
        }
    }
}

/// Checkpoint directory overrides.
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Directory of raw documents
    #[arg(long, env = "CORPUS_DIR", default_value = "articles")]
    pub corpus_dir: PathBuf,

    /// Directory of embedded records
    #[arg(long, env = "EMBEDDED_DIR", default_value = "articles-embed")]
    pub embedded_dir: PathBuf,

    /// Directory of vector-store input records
    #[arg(long, env = "VECTOR_INPUT_DIR", default_value = "articles-vectors")]
    pub vector_input_dir: PathBuf,
}

impl LayoutArgs {
    /// Directory layout for the pipeline.
    pub fn layout(&self) -> PipelineLayout {
        PipelineLayout {
            corpus: self.corpus_dir.clone(),
            embedded: self.embedded_dir.clone(),
            vector_input: self.vector_input_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        embedder: EmbedderArgs,
        #[command(flatten)]
        store: VectorStoreArgs,
        #[command(flatten)]
        upload: UploadArgs,
        #[command(flatten)]
        format: FormatArgs,
        #[command(flatten)]
        stage: EmbedStageArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    }

    fn embedder_args(dimensions: Option<usize>) -> EmbedderArgs {
        EmbedderArgs {
            embed_region: DEFAULT_REGION.into(),
            embed_endpoint: None,
            embed_model: DEFAULT_EMBED_MODEL.into(),
            embed_api_key: None,
            dimensions,
            embed_timeout_secs: 30,
            embed_max_retries: 0,
            embed_cache_size: 0,
        }
    }

    #[test]
    fn flattened_groups_have_unique_argument_ids() {
        Harness::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_config_structs() {
        let harness = Harness::try_parse_from([
            "sv",
            "--embed-region",
            "us-west-2",
            "--embed-model",
            "m",
            "--embed-timeout-secs",
            "5",
            "--vector-region",
            "eu-west-1",
            "--vector-timeout-secs",
            "9",
            "--bucket",
            "b",
            "--index",
            "i",
            "--max-batch",
            "7",
            "--metadata-fields",
            "lang,author",
            "--workers",
            "0",
            "--skip-invalid",
            "--corpus-dir",
            "docs",
        ])
        .expect("parse");

        let embed = harness.embedder.build_config(Some(1024));
        assert_eq!(embed.region.as_deref(), Some("us-west-2"));
        assert_eq!(embed.model, "m");
        assert_eq!(embed.timeout, Duration::from_secs(5));

        let store = harness.store.build_config();
        assert_eq!(store.region.as_deref(), Some("eu-west-1"));
        assert_eq!(store.timeout, Duration::from_secs(9));
        let location = store.location().expect("location");
        assert_eq!((location.bucket(), location.index()), ("b", "i"));

        assert_eq!(harness.upload.limits().max_vectors, 7);
        assert_eq!(harness.format.metadata_fields, vec!["lang", "author"]);
        let options = harness.stage.options();
        assert_eq!(options.workers, 1);
        assert!(options.skip_invalid);
        assert_eq!(harness.layout.layout().corpus, PathBuf::from("docs"));
    }

    #[test]
    fn explicit_dimensions_override_stage_default() {
        let explicit = embedder_args(Some(256));
        assert_eq!(explicit.build_config(Some(1024)).dimensions, Some(256));
        let unset = embedder_args(None);
        assert_eq!(unset.build_config(Some(1024)).dimensions, Some(1024));
        assert_eq!(unset.build_config(None).dimensions, None);
    }

    #[test]
    fn formatter_skips_blank_field_names() {
        let args = FormatArgs {
            metadata_fields: vec![" lang ".into(), String::new(), "author".into()],
        };
        assert_eq!(
            args.formatter(),
            VectorFormatter::with_passthrough(["lang", "author"])
        );
    }
}
