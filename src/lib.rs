#![warn(missing_docs)]
//! Batch pipeline that embeds document summaries, formats them for a managed
//! vector index, uploads them, and answers top-K similarity queries.

pub mod cli;
pub mod config;
pub mod embedder;
pub mod error;
pub mod formatter;
pub mod orchestrator;
pub mod query;
pub mod records;
pub mod stage;
pub mod store;
pub mod telemetry;
pub mod uploader;
pub mod vector_store;

pub use config::{EmbedderConfig, IndexLocation, PipelineLayout, UploadLimits, VectorStoreConfig};
pub use embedder::{BedrockEmbedder, CachedEmbedder, Embedder};
pub use error::{PipelineError, Result};
pub use formatter::VectorFormatter;
pub use orchestrator::{Orchestrator, StageKind, StageRun};
pub use query::{render_results, QueryEngine};
pub use records::{DocumentRecord, EmbeddedRecord, QueryMatch, VectorData, VectorRecord};
pub use stage::{EmbedReport, EmbedStage, EmbedStageOptions, FormatStage, Stage, UploadStage};
pub use store::{FsRecordStore, MemoryRecordStore, RecordStore};
pub use uploader::BatchUploader;
pub use vector_store::{MemoryVectorStore, S3VectorsClient, VectorStore};
