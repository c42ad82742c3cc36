//! LRU memoization in front of any [`Embedder`].

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use tracing::debug;

use super::{validate_text, Embedder};
use crate::error::Result;

/// Reuses vectors for texts already embedded during this process.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<f64>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Wraps `inner` with a cache holding up to `capacity` vectors.
    pub fn new(inner: E, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of cached vectors.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Vec<f64>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let text = validate_text(text)?;
        if let Some(hit) = self.lock().get(text).cloned() {
            debug!("embedding cache hit");
            return Ok(hit);
        }
        // Lock is released during the upstream call; a racing miss embeds twice.
        let embedding = self.inner.embed(text)?;
        self.lock().put(text.to_owned(), embedding.clone());
        Ok(embedding)
    }
}
