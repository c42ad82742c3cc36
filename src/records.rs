//! Per-document record shapes exchanged between pipeline stages.
//!
//! Each stage reads one shape from disk and writes the next:
//! [`DocumentRecord`] (corpus) → [`EmbeddedRecord`] → [`VectorRecord`].
//! Parsing goes through [`serde_json::Value`] first so a failed field check
//! can name the file and field that broke it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// File-name suffix marking stage 1 output.
pub const EMBED_SUFFIX: &str = "-embed";
/// File-name suffix marking stage 2 output.
pub const VECTORS_SUFFIX: &str = "-vectors";
/// Extension recognised for every record directory.
pub const RECORD_EXTENSION: &str = "json";

/// Corpus document as produced by the external corpus producer.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Stable identifier derived from the source file name.
    pub id: String,
    /// Text submitted to the embedding model. Never empty.
    pub summary: String,
    /// Display title, carried into vector metadata.
    pub title: Option<String>,
    /// Remaining passthrough fields.
    pub extra: Map<String, Value>,
}

impl DocumentRecord {
    /// Validates a parsed corpus file. `file` is only used for error context.
    pub fn parse(file: &str, id: impl Into<String>, value: Value) -> Result<Self> {
        let mut fields = into_object(file, value)?;
        let summary = match fields.remove("summary") {
            Some(Value::String(text)) if !text.trim().is_empty() => text,
            Some(Value::String(_)) => {
                return Err(PipelineError::schema(file, "summary", "is empty"))
            }
            Some(other) => {
                return Err(PipelineError::schema(
                    file,
                    "summary",
                    format!("must be a string, found {}", type_name(&other)),
                ))
            }
            None => return Err(PipelineError::schema(file, "summary", "is missing")),
        };
        let title = take_title(file, &mut fields)?;
        Ok(Self {
            id: id.into(),
            summary,
            title,
            extra: fields,
        })
    }

    /// All corpus fields, including `summary` and `title`.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = self.extra;
        fields.insert("summary".into(), Value::String(self.summary));
        if let Some(title) = self.title {
            fields.insert("title".into(), Value::String(title));
        }
        fields
    }
}

/// Corpus document plus its embedding. Written once by stage 1.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedRecord {
    /// Stage-qualified identifier, e.g. `doc42-embed`.
    pub id: String,
    fields: Map<String, Value>,
    embedding: Vec<f64>,
}

impl EmbeddedRecord {
    /// Joins a document with the vector produced for its summary.
    pub fn from_document(document: DocumentRecord, embedding: Vec<f64>) -> Self {
        Self {
            id: format!("{}{EMBED_SUFFIX}", document.id),
            fields: document.into_fields(),
            embedding,
        }
    }

    /// Validates a stage 1 artifact.
    pub fn parse(file: &str, id: impl Into<String>, value: Value) -> Result<Self> {
        let mut fields = into_object(file, value)?;
        let embedding = match fields.remove("embedding") {
            Some(raw) => float_array(file, "embedding", raw)?,
            None => return Err(PipelineError::schema(file, "embedding", "is missing")),
        };
        match fields.remove("dim") {
            None => {}
            Some(raw) => {
                let dim = raw.as_u64().ok_or_else(|| {
                    PipelineError::schema(file, "dim", "must be a non-negative integer")
                })?;
                if usize::try_from(dim).ok() != Some(embedding.len()) {
                    return Err(PipelineError::schema(
                        file,
                        "dim",
                        format!("is {dim} but embedding has {} values", embedding.len()),
                    ));
                }
            }
        }
        if let Some(title) = fields.get("title") {
            if !title.is_string() && !title.is_null() {
                return Err(PipelineError::schema(file, "title", "must be a string"));
            }
        }
        Ok(Self {
            id: id.into(),
            fields,
            embedding,
        })
    }

    /// Embedding values in model order.
    pub fn embedding(&self) -> &[f64] {
        &self.embedding
    }

    /// Embedding length.
    pub fn dim(&self) -> usize {
        self.embedding.len()
    }

    /// Document title, when the corpus carried one.
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    /// Passthrough corpus fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// On-disk shape: corpus fields plus `embedding` and `dim`.
    pub fn to_value(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("embedding".into(), Value::from(self.embedding.clone()));
        out.insert("dim".into(), Value::from(self.embedding.len()));
        Value::Object(out)
    }
}

/// Vector payload in the store's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorData {
    /// Vector values. Carried as f64; the store narrows to float32.
    pub float32: Vec<f64>,
}

/// One entry ready for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Upsert key inside the target index.
    pub id: String,
    /// Vector values.
    pub data: VectorData,
    /// Arbitrary string-keyed metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// Vector values.
    pub fn vector(&self) -> &[f64] {
        &self.data.float32
    }

    /// Validates a stage 2 artifact.
    pub fn parse(file: &str, value: Value) -> Result<Self> {
        let mut fields = into_object(file, value)?;
        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            Some(Value::String(_)) => return Err(PipelineError::schema(file, "id", "is empty")),
            Some(_) => return Err(PipelineError::schema(file, "id", "must be a string")),
            None => return Err(PipelineError::schema(file, "id", "is missing")),
        };
        let vector = match fields.remove("data") {
            Some(Value::Object(mut data)) => match data.remove("float32") {
                Some(raw) => float_array(file, "data.float32", raw)?,
                None => return Err(PipelineError::schema(file, "data.float32", "is missing")),
            },
            Some(_) => return Err(PipelineError::schema(file, "data", "must be an object")),
            None => return Err(PipelineError::schema(file, "data.float32", "is missing")),
        };
        let metadata = match fields.remove("metadata") {
            Some(Value::Object(metadata)) => metadata,
            None | Some(Value::Null) => Map::new(),
            Some(_) => return Err(PipelineError::schema(file, "metadata", "must be an object")),
        };
        Ok(Self {
            id,
            data: VectorData { float32: vector },
            metadata,
        })
    }
}

/// One ranked hit returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Stored vector id.
    pub id: String,
    /// Distance to the query vector; lower is closer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Stored metadata, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl QueryMatch {
    /// Title stored in metadata, if any.
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get("title"))
            .and_then(Value::as_str)
    }
}

/// File stem without the extension, used as the record id.
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Removes a trailing stage suffix; ids without one pass through untouched.
pub fn strip_stage_suffix<'a>(id: &'a str, suffix: &str) -> &'a str {
    match id.strip_suffix(suffix) {
        Some(base) if !base.is_empty() => base,
        _ => id,
    }
}

fn into_object(file: &str, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(PipelineError::schema(
            file,
            "<root>",
            format!("must be a JSON object, found {}", type_name(&other)),
        )),
    }
}

fn take_title(file: &str, fields: &mut Map<String, Value>) -> Result<Option<String>> {
    match fields.remove("title") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(title)) => Ok(Some(title)),
        Some(other) => Err(PipelineError::schema(
            file,
            "title",
            format!("must be a string, found {}", type_name(&other)),
        )),
    }
}

fn float_array(file: &str, field: &str, raw: Value) -> Result<Vec<f64>> {
    let items = match raw {
        Value::Array(items) => items,
        other => {
            return Err(PipelineError::schema(
                file,
                field,
                format!("must be an array, found {}", type_name(&other)),
            ))
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_f64().ok_or_else(|| {
                PipelineError::schema(file, field, format!("has a non-numeric value at index {idx}"))
            })
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
