//! Runs stages 1 → 3 over their checkpoint directories.

use std::path::Path;

use clap::ValueEnum;
use tracing::info;

use crate::config::PipelineLayout;
use crate::error::{PipelineError, Result};
use crate::stage::Stage;

/// Pipeline steps in execution order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum StageKind {
    /// Corpus → embedded records.
    Embed,
    /// Embedded records → vector-store input.
    Format,
    /// Vector-store input → index.
    Upload,
}

impl StageKind {
    /// Every stage, first to last.
    pub const ALL: [StageKind; 3] = [StageKind::Embed, StageKind::Format, StageKind::Upload];

    /// Input and output directories under `layout`.
    pub fn dirs(self, layout: &PipelineLayout) -> (&Path, &Path) {
        match self {
            StageKind::Embed => (layout.corpus.as_path(), layout.embedded.as_path()),
            StageKind::Format => (layout.embedded.as_path(), layout.vector_input.as_path()),
            StageKind::Upload => (layout.vector_input.as_path(), layout.vector_input.as_path()),
        }
    }
}

/// Count reported by one completed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRun {
    /// Which stage ran.
    pub kind: StageKind,
    /// Records it handled.
    pub count: usize,
}

/// Sequences registered stages; stages share nothing but directories.
pub struct Orchestrator<'a> {
    layout: PipelineLayout,
    stages: Vec<(StageKind, &'a dyn Stage)>,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator with no stages registered.
    pub fn new(layout: PipelineLayout) -> Self {
        Self {
            layout,
            stages: Vec::new(),
        }
    }

    /// Registers `stage` as `kind`, replacing an earlier registration.
    pub fn with_stage(mut self, kind: StageKind, stage: &'a dyn Stage) -> Self {
        self.stages.retain(|(existing, _)| *existing != kind);
        self.stages.push((kind, stage));
        self
    }

    /// Directory layout in use.
    pub fn layout(&self) -> &PipelineLayout {
        &self.layout
    }

    /// Runs every stage from `from` to `to` inclusive, stopping at the first
    /// failure.
    pub fn run(&self, from: StageKind, to: StageKind) -> Result<Vec<StageRun>> {
        if from > to {
            return Err(PipelineError::InvalidInput(format!(
                "stage range {from:?}..={to:?} is empty"
            )));
        }
        let selected: Vec<(StageKind, &dyn Stage)> = StageKind::ALL
            .into_iter()
            .filter(|kind| (from..=to).contains(kind))
            .map(|kind| {
                self.stage(kind).map(|stage| (kind, stage)).ok_or_else(|| {
                    PipelineError::ConfigurationError(format!("no {kind:?} stage registered"))
                })
            })
            .collect::<Result<_>>()?;

        let mut runs = Vec::with_capacity(selected.len());
        for (kind, stage) in selected {
            let (input, output) = kind.dirs(&self.layout);
            info!(
                stage = stage.name(),
                input = %input.display(),
                "stage starting"
            );
            let count = stage.run(input, output)?;
            info!(stage = stage.name(), count, "stage finished");
            runs.push(StageRun { kind, count });
        }
        Ok(runs)
    }

    fn stage(&self, kind: StageKind) -> Option<&'a dyn Stage> {
        self.stages
            .iter()
            .find(|(existing, _)| *existing == kind)
            .map(|(_, stage)| *stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records the directories it was run with.
    struct RecordingStage {
        name: &'static str,
        calls: Mutex<Vec<(PathBuf, PathBuf)>>,
        fail: bool,
    }

    impl RecordingStage {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl Stage for RecordingStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&self, input: &Path, output: &Path) -> Result<usize> {
            self.calls
                .lock()
                .expect("lock")
                .push((input.to_path_buf(), output.to_path_buf()));
            if self.fail {
                return Err(PipelineError::UpstreamError("boom".into()));
            }
            Ok(input.as_os_str().len())
        }
    }

    #[test]
    fn runs_stages_in_order_over_checkpoint_dirs() {
        let (embed, format, upload) = (
            RecordingStage::new("e"),
            RecordingStage::new("f"),
            RecordingStage::new("u"),
        );
        let orchestrator = Orchestrator::new(PipelineLayout::default())
            .with_stage(StageKind::Upload, &upload)
            .with_stage(StageKind::Embed, &embed)
            .with_stage(StageKind::Format, &format);
        let runs = orchestrator
            .run(StageKind::Embed, StageKind::Upload)
            .expect("run");
        let kinds: Vec<StageKind> = runs.iter().map(|run| run.kind).collect();
        assert_eq!(kinds, StageKind::ALL.to_vec());
        assert_eq!(
            format.calls(),
            vec![(PathBuf::from("articles-embed"), PathBuf::from("articles-vectors"))]
        );
        assert_eq!(runs[0].count, "articles".len());
    }

    #[test]
    fn resumes_from_a_later_stage() {
        let upload = RecordingStage::new("u");
        let orchestrator =
            Orchestrator::new(PipelineLayout::default()).with_stage(StageKind::Upload, &upload);
        let runs = orchestrator
            .run(StageKind::Upload, StageKind::Upload)
            .expect("run");
        assert_eq!(runs.len(), 1);
        assert_eq!(upload.calls().len(), 1);
    }

    #[test]
    fn missing_stage_fails_before_anything_runs() {
        let embed = RecordingStage::new("e");
        let orchestrator =
            Orchestrator::new(PipelineLayout::default()).with_stage(StageKind::Embed, &embed);
        let err = orchestrator
            .run(StageKind::Embed, StageKind::Format)
            .expect_err("format missing");
        assert!(matches!(err, PipelineError::ConfigurationError(_)));
        assert!(embed.calls().is_empty());
    }

    #[test]
    fn failure_stops_later_stages() {
        let mut embed = RecordingStage::new("e");
        embed.fail = true;
        let format = RecordingStage::new("f");
        let orchestrator = Orchestrator::new(PipelineLayout::default())
            .with_stage(StageKind::Embed, &embed)
            .with_stage(StageKind::Format, &format);
        assert!(orchestrator.run(StageKind::Embed, StageKind::Format).is_err());
        assert!(format.calls().is_empty());
    }

    #[test]
    fn reversed_range_is_invalid() {
        let orchestrator = Orchestrator::new(PipelineLayout::default());
        assert!(matches!(
            orchestrator.run(StageKind::Upload, StageKind::Embed),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
