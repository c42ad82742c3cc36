//! In-process vector store with upsert semantics and brute-force search.
//!
//! Stands in for the managed index in tests and local dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{BatchUploadRequest, QueryRequest, VectorStore};
use crate::config::IndexLocation;
use crate::error::{PipelineError, Result};
use crate::records::{QueryMatch, VectorRecord};

/// Distance function applied at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// L2 distance.
    Euclidean,
}

impl DistanceMetric {
    fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
        }
    }
}

#[derive(Default)]
struct MemoryIndexes {
    indexes: BTreeMap<IndexLocation, BTreeMap<String, VectorRecord>>,
    put_calls: usize,
}

/// Vector store held entirely in memory.
#[derive(Default)]
pub struct MemoryVectorStore {
    metric: DistanceMetric,
    state: Mutex<MemoryIndexes>,
}

impl MemoryVectorStore {
    /// Empty store using cosine distance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store using `metric`.
    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            metric,
            state: Mutex::default(),
        }
    }

    /// Stored vector for `id`, if any.
    pub fn get(&self, location: &IndexLocation, id: &str) -> Option<VectorRecord> {
        self.lock()
            .indexes
            .get(location)
            .and_then(|index| index.get(id))
            .cloned()
    }

    /// Number of vectors in the index.
    pub fn len(&self, location: &IndexLocation) -> usize {
        self.lock().indexes.get(location).map_or(0, BTreeMap::len)
    }

    /// Number of put calls received so far.
    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryIndexes> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VectorStore for MemoryVectorStore {
    fn put_vectors(&self, request: &BatchUploadRequest<'_>) -> Result<()> {
        let mut state = self.lock();
        let existing_dim = state
            .indexes
            .get(request.location)
            .and_then(|index| index.values().next())
            .map(|record| record.vector().len());
        let dim = existing_dim.or_else(|| request.vectors.first().map(|r| r.vector().len()));
        // Check the whole call before touching the index.
        if let Some(bad) = request
            .vectors
            .iter()
            .find(|record| Some(record.vector().len()) != dim)
        {
            return Err(PipelineError::UpstreamError(format!(
                "vector `{}` has dimension {}, index expects {}",
                bad.id,
                bad.vector().len(),
                dim.unwrap_or_default()
            )));
        }
        state.put_calls += 1;
        let index = state.indexes.entry(request.location.clone()).or_default();
        for record in request.vectors {
            index.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn query_vectors(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryMatch>> {
        let state = self.lock();
        let Some(index) = state.indexes.get(request.location) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<(f64, &VectorRecord)> = Vec::with_capacity(index.len());
        for record in index.values() {
            if record.vector().len() != request.vector.len() {
                return Err(PipelineError::UpstreamError(format!(
                    "query vector has dimension {}, index expects {}",
                    request.vector.len(),
                    record.vector().len()
                )));
            }
            hits.push((self.metric.distance(request.vector, record.vector()), record));
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(hits
            .into_iter()
            .take(request.top_k)
            .map(|(distance, record)| QueryMatch {
                id: record.id.clone(),
                distance: request.return_distance.then_some(distance),
                metadata: request.return_metadata.then(|| record.metadata.clone()),
            })
            .collect())
    }
}
