//! Stage 2: embedded records → vector-store input files.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use super::Stage;
use crate::error::{PipelineError, Result};
use crate::formatter::VectorFormatter;
use crate::records::{file_stem, EmbeddedRecord, VectorRecord, RECORD_EXTENSION, VECTORS_SUFFIX};
use crate::store::RecordStore;

/// Reformats every embedded record; makes no network calls.
pub struct FormatStage<'a, R: ?Sized> {
    records: &'a R,
    formatter: VectorFormatter,
}

impl<'a, R: RecordStore + ?Sized> FormatStage<'a, R> {
    /// Creates the stage.
    pub fn new(records: &'a R, formatter: VectorFormatter) -> Self {
        Self { records, formatter }
    }

    /// Formats the whole directory in memory; nothing is written unless every
    /// record is valid.
    fn format_all(&self, input: &Path) -> Result<Vec<VectorRecord>> {
        let names = self.records.list_inputs(input)?;
        let mut sources: HashMap<String, String> = HashMap::with_capacity(names.len());
        let mut vectors = Vec::with_capacity(names.len());
        for name in &names {
            let value = self.records.read_record(input, name)?;
            let record = EmbeddedRecord::parse(name, file_stem(name), value)?;
            let vector = self.formatter.format(&record);
            if let Some(previous) = sources.insert(vector.id.clone(), name.clone()) {
                return Err(PipelineError::InvalidInput(format!(
                    "{previous} and {name} both map to vector id `{}`",
                    vector.id
                )));
            }
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

impl<'a, R: RecordStore + ?Sized> Stage for FormatStage<'a, R> {
    fn name(&self) -> &'static str {
        "format"
    }

    fn run(&self, input: &Path, output: &Path) -> Result<usize> {
        let vectors = self.format_all(input)?;
        for vector in &vectors {
            let name = format!("{}{VECTORS_SUFFIX}.{RECORD_EXTENSION}", vector.id);
            let value = serde_json::to_value(vector).map_err(|source| PipelineError::Json {
                path: output.join(&name),
                source,
            })?;
            let path = self.records.write_record(output, &name, &value)?;
            info!(
                path = %path.display(),
                key = %vector.id,
                dim = vector.vector().len(),
                "saved vector input"
            );
        }
        Ok(vectors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use serde_json::json;

    fn embedded_dir(files: &[(&str, serde_json::Value)]) -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        store.create_dir("embedded");
        for (name, value) in files {
            store.insert(
                format!("embedded/{name}"),
                serde_json::to_vec(value).expect("serialize"),
            );
        }
        store
    }

    #[test]
    fn writes_vector_inputs_keyed_by_stripped_id() {
        let store = embedded_dir(&[(
            "doc42-embed.json",
            json!({ "summary": "S", "title": "T", "embedding": [1.0, 2.0], "dim": 2 }),
        )]);
        let stage = FormatStage::new(&store, VectorFormatter::new());
        assert_eq!(stage.run(Path::new("embedded"), Path::new("vectors")).expect("run"), 1);
        let files = store.files_in(Path::new("vectors"));
        let bytes = files.get("doc42-vectors.json").expect("written");
        let value: serde_json::Value = serde_json::from_slice(bytes).expect("json");
        assert_eq!(
            value,
            json!({
                "id": "doc42",
                "data": { "float32": [1.0, 2.0] },
                "metadata": { "fileName": "doc42.json", "title": "T" }
            })
        );
    }

    #[test]
    fn one_bad_record_writes_nothing() {
        let store = embedded_dir(&[
            ("a-embed.json", json!({ "embedding": [1.0] })),
            ("b-embed.json", json!({ "title": "no vector" })),
            ("c-embed.json", json!({ "embedding": [2.0] })),
        ]);
        let err = FormatStage::new(&store, VectorFormatter::new())
            .run(Path::new("embedded"), Path::new("vectors"))
            .expect_err("schema failure");
        assert!(matches!(err, PipelineError::SchemaError { ref file, .. } if file == "b-embed.json"));
        assert!(store.files_in(Path::new("vectors")).is_empty());
    }

    #[test]
    fn colliding_ids_are_rejected() {
        let store = embedded_dir(&[
            ("a-embed.json", json!({ "embedding": [1.0] })),
            ("a.json", json!({ "embedding": [2.0] })),
        ]);
        let err = FormatStage::new(&store, VectorFormatter::new())
            .run(Path::new("embedded"), Path::new("vectors"))
            .expect_err("collision");
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
