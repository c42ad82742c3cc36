//! Embedded record → vector-store input conversion.

use serde_json::{Map, Value};

use crate::records::{strip_stage_suffix, EmbeddedRecord, VectorData, VectorRecord, EMBED_SUFFIX};

/// Converts stage 1 artifacts into `{id, data, metadata}` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorFormatter {
    passthrough: Vec<String>,
}

impl VectorFormatter {
    /// Formatter emitting only `fileName` and `title` metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also copies the named corpus fields into metadata when present.
    pub fn with_passthrough<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            passthrough: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Vector id for an embedded record id: `doc123-embed` → `doc123`.
    pub fn vector_id(embedded_id: &str) -> &str {
        strip_stage_suffix(embedded_id, EMBED_SUFFIX)
    }

    /// Builds the vector entry. The embedding is copied verbatim.
    pub fn format(&self, record: &EmbeddedRecord) -> VectorRecord {
        let id = Self::vector_id(&record.id).to_owned();
        let mut metadata = Map::new();
        metadata.insert("fileName".into(), Value::String(format!("{id}.json")));
        if let Some(title) = record.title() {
            metadata.insert("title".into(), Value::String(title.to_owned()));
        }
        for field in &self.passthrough {
            if metadata.contains_key(field) {
                continue;
            }
            if let Some(value) = record.fields().get(field) {
                metadata.insert(field.clone(), value.clone());
            }
        }
        VectorRecord {
            id,
            data: VectorData {
                float32: record.embedding().to_vec(),
            },
            metadata,
        }
    }
}
