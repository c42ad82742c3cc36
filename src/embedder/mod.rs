//! Text-to-vector embedding clients.

pub mod bedrock;
pub mod cache;

use std::sync::Arc;

use crate::error::{PipelineError, Result};

pub use bedrock::BedrockEmbedder;
pub use cache::CachedEmbedder;

/// Maps one text to one fixed-length vector.
///
/// Implementations make at most one upstream call per invocation and never
/// substitute a default vector on failure.
pub trait Embedder: Send + Sync {
    /// Embeds `text`. Callers validate with [`validate_text`] first.
    fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        (**self).embed(text)
    }
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        (**self).embed(text)
    }
}

/// Rejects empty or whitespace-only text before any upstream call.
pub fn validate_text(text: &str) -> Result<&str> {
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "text to embed must be a non-empty string".into(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_invalid_input() {
        assert!(matches!(validate_text(""), Err(PipelineError::InvalidInput(_))));
        assert!(matches!(validate_text(" \n\t"), Err(PipelineError::InvalidInput(_))));
        assert_eq!(validate_text("恋をしたい").expect("valid"), "恋をしたい");
    }
}
