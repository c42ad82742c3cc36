//! Vector-store clients: put-by-id and top-k similarity query.

pub mod memory;
pub mod s3vectors;

use std::sync::Arc;

use crate::config::IndexLocation;
use crate::error::Result;
use crate::records::{QueryMatch, VectorRecord};

pub use memory::{DistanceMetric, MemoryVectorStore};
pub use s3vectors::S3VectorsClient;

/// One put call's worth of vectors for a single index.
#[derive(Debug, Clone, Copy)]
pub struct BatchUploadRequest<'a> {
    /// Target bucket and index.
    pub location: &'a IndexLocation,
    /// Vectors to upsert. Never empty.
    pub vectors: &'a [VectorRecord],
}

/// Nearest-neighbour lookup against a single index.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    /// Target bucket and index.
    pub location: &'a IndexLocation,
    /// Maximum number of hits.
    pub top_k: usize,
    /// Query vector.
    pub vector: &'a [f64],
    /// Ask the store to return distances.
    pub return_distance: bool,
    /// Ask the store to return metadata.
    pub return_metadata: bool,
}

/// Opaque id → vector + metadata store.
pub trait VectorStore: Send + Sync {
    /// Upserts every vector in the request. Either the whole call succeeds or
    /// it fails; callers never see a partially applied request.
    fn put_vectors(&self, request: &BatchUploadRequest<'_>) -> Result<()>;

    /// Returns at most `top_k` matches in whatever order the store produces.
    fn query_vectors(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryMatch>>;
}

impl<S: VectorStore + ?Sized> VectorStore for Arc<S> {
    fn put_vectors(&self, request: &BatchUploadRequest<'_>) -> Result<()> {
        (**self).put_vectors(request)
    }

    fn query_vectors(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryMatch>> {
        (**self).query_vectors(request)
    }
}

impl<S: VectorStore + ?Sized> VectorStore for &S {
    fn put_vectors(&self, request: &BatchUploadRequest<'_>) -> Result<()> {
        (**self).put_vectors(request)
    }

    fn query_vectors(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryMatch>> {
        (**self).query_vectors(request)
    }
}
