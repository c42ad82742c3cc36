//! Stage 1: corpus documents → embedded records.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::Stage;
use crate::embedder::Embedder;
use crate::error::{PipelineError, Result};
use crate::records::{file_stem, DocumentRecord, EmbeddedRecord, RECORD_EXTENSION};
use crate::store::RecordStore;

/// Tuning for the embedding stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedStageOptions {
    /// Concurrent embedding calls. `1` runs strictly sequentially.
    pub workers: usize,
    /// Skip documents that fail validation instead of aborting.
    pub skip_invalid: bool,
}

impl Default for EmbedStageOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            skip_invalid: false,
        }
    }
}

/// Outcome of one embedding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedReport {
    /// Embedded records written.
    pub written: usize,
    /// Ids of documents skipped under `skip_invalid`.
    pub skipped: Vec<String>,
}

/// Embeds every document summary and writes `{id}-embed.json`.
pub struct EmbedStage<'a, R: ?Sized, E> {
    records: &'a R,
    embedder: E,
    options: EmbedStageOptions,
}

struct PendingDocument {
    file: String,
    document: DocumentRecord,
}

type EmbeddingTask = (usize, String);
type EmbeddingResult = (usize, Result<Vec<f64>>);

impl<'a, R, E> EmbedStage<'a, R, E>
where
    R: RecordStore + ?Sized,
    E: Embedder,
{
    /// Creates the stage.
    pub fn new(records: &'a R, embedder: E, options: EmbedStageOptions) -> Self {
        Self {
            records,
            embedder,
            options,
        }
    }

    /// Runs the stage and reports skipped ids alongside the count.
    ///
    /// Every document is read and validated before the first embedding call,
    /// so a bad record in strict mode costs no upstream traffic.
    pub fn run_report(&self, input: &Path, output: &Path) -> Result<EmbedReport> {
        let names = self.records.list_inputs(input)?;
        let (pending, skipped) = self.load_documents(input, &names)?;
        if pending.is_empty() {
            warn!(skipped = skipped.len(), "every document was skipped; nothing to embed");
            return Ok(EmbedReport {
                written: 0,
                skipped,
            });
        }
        let workers = self.options.workers.max(1).min(pending.len());
        info!(documents = pending.len(), workers, "embedding corpus");
        let written = if workers == 1 {
            self.embed_sequential(pending, output)?
        } else {
            self.embed_parallel(pending, output, workers)?
        };
        if !skipped.is_empty() {
            warn!(count = skipped.len(), ids = ?skipped, "skipped invalid documents");
        }
        Ok(EmbedReport { written, skipped })
    }

    fn load_documents(
        &self,
        input: &Path,
        names: &[String],
    ) -> Result<(Vec<PendingDocument>, Vec<String>)> {
        let mut sources: HashMap<&str, &str> = HashMap::with_capacity(names.len());
        for name in names {
            if let Some(previous) = sources.insert(file_stem(name), name) {
                return Err(PipelineError::InvalidInput(format!(
                    "{previous} and {name} both map to document id `{}`",
                    file_stem(name)
                )));
            }
        }

        let mut pending = Vec::with_capacity(names.len());
        let mut skipped = Vec::new();
        for name in names {
            let id = file_stem(name);
            let parsed = self
                .records
                .read_record(input, name)
                .and_then(|value| DocumentRecord::parse(name, id, value));
            match parsed {
                Ok(document) => pending.push(PendingDocument {
                    file: name.clone(),
                    document,
                }),
                Err(err) if self.options.skip_invalid && err.is_record_error() => {
                    warn!(file = %name, error = %err, "skipping invalid document");
                    skipped.push(id.to_owned());
                }
                Err(err) => return Err(err),
            }
        }
        Ok((pending, skipped))
    }

    fn embed_sequential(&self, pending: Vec<PendingDocument>, output: &Path) -> Result<usize> {
        let mut written = 0usize;
        for PendingDocument { file, document } in pending {
            let embedding = self
                .embedder
                .embed(&document.summary)
                .map_err(|err| err.in_file(&file))?;
            self.write_embedded(output, document, embedding)?;
            written += 1;
        }
        Ok(written)
    }

    /// Fans embedding calls out over `workers` threads and writes results in
    /// input order. The first failure stops further dispatch.
    fn embed_parallel(
        &self,
        pending: Vec<PendingDocument>,
        output: &Path,
        workers: usize,
    ) -> Result<usize> {
        let total = pending.len();
        let (task_tx, task_rx) = bounded::<EmbeddingTask>(total);
        let (result_tx, result_rx) = bounded::<EmbeddingResult>(total);
        for (idx, item) in pending.iter().enumerate() {
            task_tx
                .send((idx, item.document.summary.clone()))
                .map_err(|_| PipelineError::UpstreamError("embedding task queue closed".into()))?;
        }
        drop(task_tx);

        let abort = AtomicBool::new(false);
        thread::scope(|scope| {
            for worker_id in 0..workers {
                let tasks = task_rx.clone();
                let results = result_tx.clone();
                let embedder = &self.embedder;
                let abort = &abort;
                scope.spawn(move || worker_loop(worker_id, tasks, results, embedder, abort));
            }
            drop(result_tx);
            let outcome = self.write_in_order(pending, result_rx, output);
            if outcome.is_err() {
                abort.store(true, Ordering::SeqCst);
            }
            outcome
        })
    }

    fn write_in_order(
        &self,
        pending: Vec<PendingDocument>,
        results: Receiver<EmbeddingResult>,
        output: &Path,
    ) -> Result<usize> {
        let total = pending.len();
        let mut slots: Vec<Option<PendingDocument>> = pending.into_iter().map(Some).collect();
        let mut ready: BTreeMap<usize, Result<Vec<f64>>> = BTreeMap::new();
        let mut next = 0usize;
        for (idx, result) in results.iter() {
            ready.insert(idx, result);
            while let Some(result) = ready.remove(&next) {
                let PendingDocument { file, document } = slots
                    .get_mut(next)
                    .and_then(Option::take)
                    .ok_or_else(|| {
                        PipelineError::UpstreamError(format!("duplicate embedding result {next}"))
                    })?;
                let embedding = result.map_err(|err| err.in_file(&file))?;
                self.write_embedded(output, document, embedding)?;
                next += 1;
            }
            if next == total {
                break;
            }
        }
        if next != total {
            return Err(PipelineError::UpstreamError(format!(
                "embedding workers stopped after {next} of {total} documents"
            )));
        }
        Ok(next)
    }

    fn write_embedded(
        &self,
        output: &Path,
        document: DocumentRecord,
        embedding: Vec<f64>,
    ) -> Result<()> {
        let dim = embedding.len();
        let record = EmbeddedRecord::from_document(document, embedding);
        let name = format!("{}.{RECORD_EXTENSION}", record.id);
        self.records.write_record(output, &name, &record.to_value())?;
        info!(id = %record.id, dim, "embedding saved");
        Ok(())
    }
}

fn worker_loop<E: Embedder>(
    worker_id: usize,
    tasks: Receiver<EmbeddingTask>,
    results: Sender<EmbeddingResult>,
    embedder: &E,
    abort: &AtomicBool,
) {
    for (idx, text) in tasks.iter() {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        debug!(worker_id, document = idx, "embedding document");
        let result = embedder.embed(&text);
        if results.send((idx, result)).is_err() {
            break;
        }
    }
}

impl<'a, R, E> Stage for EmbedStage<'a, R, E>
where
    R: RecordStore + ?Sized,
    E: Embedder,
{
    fn name(&self) -> &'static str {
        "embed"
    }

    fn run(&self, input: &Path, output: &Path) -> Result<usize> {
        self.run_report(input, output).map(|report| report.written)
    }
}
