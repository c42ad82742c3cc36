//! Stage 3: vector-store input files → vector index.

use std::path::Path;

use tracing::info;

use super::Stage;
use crate::error::Result;
use crate::records::VectorRecord;
use crate::store::RecordStore;
use crate::uploader::BatchUploader;
use crate::vector_store::VectorStore;

/// Reads every vector file and upserts them through a [`BatchUploader`].
pub struct UploadStage<'a, R: ?Sized, S> {
    records: &'a R,
    uploader: BatchUploader<S>,
}

impl<'a, R: RecordStore + ?Sized, S: VectorStore> UploadStage<'a, R, S> {
    /// Creates the stage.
    pub fn new(records: &'a R, uploader: BatchUploader<S>) -> Self {
        Self { records, uploader }
    }

    /// Parses every file in `input`; the first invalid one aborts.
    pub fn load(&self, input: &Path) -> Result<Vec<VectorRecord>> {
        let names = self.records.list_inputs(input)?;
        names
            .iter()
            .map(|name| {
                let value = self.records.read_record(input, name)?;
                VectorRecord::parse(name, value)
            })
            .collect()
    }
}

impl<'a, R: RecordStore + ?Sized, S: VectorStore> Stage for UploadStage<'a, R, S> {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn run(&self, input: &Path, _output: &Path) -> Result<usize> {
        let vectors = self.load(input)?;
        let uploaded = self.uploader.upload(&vectors)?;
        info!(uploaded, "inserted/updated vectors");
        Ok(uploaded)
    }
}
