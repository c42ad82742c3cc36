//! Directory-to-directory pipeline stages.
//!
//! Each stage reads one directory of input-shaped JSON through a
//! [`RecordStore`](crate::store::RecordStore) and either writes a directory of
//! output-shaped JSON or pushes to the vector store. Stages share no
//! in-memory state, so any of them can be re-run alone.

pub mod embed;
pub mod format;
pub mod upload;

use std::path::Path;

use crate::error::Result;

pub use embed::{EmbedReport, EmbedStage, EmbedStageOptions};
pub use format::FormatStage;
pub use upload::UploadStage;

/// One independent, re-runnable pipeline step.
pub trait Stage {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Processes every record in `input` and returns how many were handled.
    ///
    /// Stages that push to a remote store ignore `output`.
    fn run(&self, input: &Path, output: &Path) -> Result<usize>;
}
