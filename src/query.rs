//! Query-time path: embed the text, ask the store for neighbours, rank them.

use std::cmp::Ordering;
use std::fmt::Write as _;

use tracing::info;

use crate::config::IndexLocation;
use crate::embedder::{validate_text, Embedder};
use crate::error::{PipelineError, Result};
use crate::records::QueryMatch;
use crate::vector_store::{QueryRequest, VectorStore};

/// Read-only similarity search over one index.
pub struct QueryEngine<E, S> {
    embedder: E,
    store: S,
    location: IndexLocation,
}

impl<E: Embedder, S: VectorStore> QueryEngine<E, S> {
    /// Creates an engine over `location`.
    pub fn new(embedder: E, store: S, location: IndexLocation) -> Self {
        Self {
            embedder,
            store,
            location,
        }
    }

    /// Returns up to `top_k` matches sorted by ascending distance.
    ///
    /// The store's order is not trusted: results are re-sorted client-side
    /// with a stable sort, and hits without a distance stay after those with
    /// one, in store order.
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<QueryMatch>> {
        let text = validate_text(text)?;
        if top_k == 0 {
            return Err(PipelineError::InvalidInput("topK must be positive".into()));
        }
        let vector = self.embedder.embed(text)?;
        info!(dim = vector.len(), "query embedding created");
        let mut hits = self.store.query_vectors(&QueryRequest {
            location: &self.location,
            top_k,
            vector: &vector,
            return_distance: true,
            return_metadata: true,
        })?;
        rank_by_distance(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Stable ascending sort by distance; missing distances sort last.
pub fn rank_by_distance(hits: &mut [QueryMatch]) {
    hits.sort_by(|a, b| match (a.distance, b.distance) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// One line per hit: `1. key=doc1, distance=0.1234, title=T`.
pub fn render_results(hits: &[QueryMatch]) -> String {
    let mut out = String::new();
    for (idx, hit) in hits.iter().enumerate() {
        let distance = hit
            .distance
            .map_or_else(|| "n/a".to_string(), |d| format!("{d:.4}"));
        let _ = writeln!(
            out,
            "{}. key={}, distance={}, title={}",
            idx + 1,
            hit.id,
            distance,
            hit.title().unwrap_or("-")
        );
    }
    out
}
