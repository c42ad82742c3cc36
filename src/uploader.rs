//! Size-aware batching of vector uploads.

use std::collections::HashSet;
use std::ops::Range;

use tracing::{debug, info};

use crate::config::{IndexLocation, UploadLimits};
use crate::error::{PipelineError, Result};
use crate::records::VectorRecord;
use crate::vector_store::{BatchUploadRequest, VectorStore};

/// Envelope bytes around the vector list (field names, braces, names).
const REQUEST_OVERHEAD_BYTES: usize = 96;
/// Slack per vector for the store's own field naming and separators.
const PER_VECTOR_OVERHEAD_BYTES: usize = 16;

/// Pushes validated vectors to one index in sequential, size-bounded chunks.
pub struct BatchUploader<S> {
    store: S,
    location: IndexLocation,
    limits: UploadLimits,
}

impl<S: VectorStore> BatchUploader<S> {
    /// Creates an uploader for `location`.
    pub fn new(store: S, location: IndexLocation, limits: UploadLimits) -> Result<Self> {
        if limits.max_vectors == 0 || limits.max_payload_bytes == 0 {
            return Err(PipelineError::ConfigurationError(
                "upload limits must be positive".into(),
            ));
        }
        Ok(Self {
            store,
            location,
            limits,
        })
    }

    /// Target index.
    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    /// Uploads every record and returns how many were sent.
    ///
    /// All records are checked before the first put call; one invalid record
    /// aborts the whole upload.
    pub fn upload(&self, records: &[VectorRecord]) -> Result<usize> {
        let chunks = self.plan_chunks(records)?;
        info!(
            vectors = records.len(),
            requests = chunks.len(),
            bucket = self.location.bucket(),
            index = self.location.index(),
            "putting vectors"
        );
        for (idx, range) in chunks.iter().enumerate() {
            let vectors = &records[range.clone()];
            self.store.put_vectors(&BatchUploadRequest {
                location: &self.location,
                vectors,
            })?;
            info!(
                request = idx + 1,
                of = chunks.len(),
                vectors = vectors.len(),
                "put request succeeded"
            );
        }
        Ok(records.len())
    }

    /// Validates `records` and splits them into request-sized index ranges.
    pub fn plan_chunks(&self, records: &[VectorRecord]) -> Result<Vec<Range<usize>>> {
        if records.is_empty() {
            return Err(PipelineError::InvalidInput("no vectors to upload".into()));
        }
        validate_records(records)?;

        let envelope = REQUEST_OVERHEAD_BYTES
            + self.location.bucket().len()
            + self.location.index().len();
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut bytes = envelope;
        for (idx, record) in records.iter().enumerate() {
            let size = encoded_len(record)?;
            if envelope + size > self.limits.max_payload_bytes {
                return Err(PipelineError::PayloadTooLarge {
                    id: record.id.clone(),
                    bytes: envelope + size,
                    limit: self.limits.max_payload_bytes,
                });
            }
            let full_by_count = idx - start >= self.limits.max_vectors;
            let full_by_bytes = bytes + size > self.limits.max_payload_bytes;
            if idx > start && (full_by_count || full_by_bytes) {
                chunks.push(start..idx);
                start = idx;
                bytes = envelope;
            }
            bytes += size;
        }
        chunks.push(start..records.len());
        debug!(chunks = chunks.len(), "planned upload requests");
        Ok(chunks)
    }
}

fn validate_records(records: &[VectorRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let label = if record.id.is_empty() {
            format!("<vector #{idx}>")
        } else {
            record.id.clone()
        };
        if record.id.trim().is_empty() {
            return Err(PipelineError::schema(label, "id", "is empty"));
        }
        if record.vector().is_empty() {
            return Err(PipelineError::schema(label, "data.float32", "is empty"));
        }
        if let Some(bad) = record.vector().iter().position(|value| !value.is_finite()) {
            return Err(PipelineError::schema(
                label,
                "data.float32",
                format!("has a non-finite value at index {bad}"),
            ));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(PipelineError::InvalidInput(format!(
                "duplicate vector id `{}` in one upload",
                record.id
            )));
        }
    }
    Ok(())
}

fn encoded_len(record: &VectorRecord) -> Result<usize> {
    serde_json::to_vec(record)
        .map(|bytes| bytes.len() + PER_VECTOR_OVERHEAD_BYTES)
        .map_err(|err| PipelineError::InvalidInput(format!("vector `{}`: {err}", record.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::VectorData;
    use crate::vector_store::MemoryVectorStore;
    use serde_json::Map;

    fn record(id: &str, dim: usize) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            data: VectorData {
                float32: vec![0.5; dim],
            },
            metadata: Map::new(),
        }
    }

    fn uploader(limits: UploadLimits) -> BatchUploader<MemoryVectorStore> {
        let location = IndexLocation::new("bucket", "index").expect("location");
        BatchUploader::new(MemoryVectorStore::new(), location, limits).expect("uploader")
    }

    #[test]
    fn small_upload_is_one_request() {
        let uploader = uploader(UploadLimits::default());
        let records: Vec<_> = (0..3).map(|i| record(&format!("d{i}"), 4)).collect();
        assert_eq!(uploader.upload(&records).expect("upload"), 3);
        assert_eq!(uploader.store.put_calls(), 1);
        assert_eq!(uploader.store.len(uploader.location()), 3);
    }

    #[test]
    fn splits_by_vector_count() {
        let uploader = uploader(UploadLimits {
            max_vectors: 2,
            ..UploadLimits::default()
        });
        let records: Vec<_> = (0..5).map(|i| record(&format!("d{i}"), 2)).collect();
        let chunks = uploader.plan_chunks(&records).expect("plan");
        assert_eq!(chunks, vec![0..2, 2..4, 4..5]);
        uploader.upload(&records).expect("upload");
        assert_eq!(uploader.store.put_calls(), 3);
        assert_eq!(uploader.store.len(uploader.location()), 5);
    }

    #[test]
    fn splits_by_payload_size() {
        let one = encoded_len(&record("d0", 32)).expect("len");
        let envelope = REQUEST_OVERHEAD_BYTES + "bucket".len() + "index".len();
        let uploader = uploader(UploadLimits {
            max_vectors: 100,
            max_payload_bytes: envelope + one * 2,
        });
        let records: Vec<_> = (0..5).map(|i| record(&format!("d{i}"), 32)).collect();
        let chunks = uploader.plan_chunks(&records).expect("plan");
        assert_eq!(chunks, vec![0..2, 2..4, 4..5]);
    }

    #[test]
    fn oversized_single_record_is_rejected() {
        let uploader = uploader(UploadLimits {
            max_vectors: 10,
            max_payload_bytes: 200,
        });
        let err = uploader
            .plan_chunks(&[record("huge", 512)])
            .expect_err("too large");
        assert!(matches!(err, PipelineError::PayloadTooLarge { ref id, .. } if id == "huge"));
    }

    #[test]
    fn invalid_record_aborts_before_any_put() {
        let uploader = uploader(UploadLimits::default());
        let records = vec![record("ok", 2), record("", 2)];
        let err = uploader.upload(&records).expect_err("invalid");
        assert!(err.is_record_error());
        assert_eq!(uploader.store.put_calls(), 0);

        let records = vec![record("ok", 2), record("empty", 0)];
        assert!(uploader.upload(&records).is_err());

        let records = vec![record("dup", 2), record("dup", 2)];
        assert!(matches!(
            uploader.upload(&records),
            Err(PipelineError::InvalidInput(_))
        ));
        assert_eq!(uploader.store.put_calls(), 0);
    }

    #[test]
    fn empty_upload_is_invalid() {
        let uploader = uploader(UploadLimits::default());
        assert!(matches!(
            uploader.upload(&[]),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn reupload_overwrites_by_id() {
        let uploader = uploader(UploadLimits::default());
        uploader.upload(&[record("same", 2)]).expect("first");
        let mut newer = record("same", 2);
        newer.data.float32 = vec![9.0, 9.0];
        uploader.upload(&[newer]).expect("second");
        let stored = uploader
            .store
            .get(uploader.location(), "same")
            .expect("stored");
        assert_eq!(stored.vector(), &[9.0, 9.0]);
        assert_eq!(uploader.store.len(uploader.location()), 1);
    }
}
