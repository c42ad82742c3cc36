//! Runs stages 1 → 3 back to back, or any contiguous slice of them.

use anyhow::{Context, Result};
use clap::Parser;
use summary_vectors::cli::{
    EmbedStageArgs, EmbedderArgs, FormatArgs, LayoutArgs, UploadArgs, VectorStoreArgs,
};
use summary_vectors::config::DEFAULT_INGEST_DIMENSIONS;
use summary_vectors::telemetry::init_tracing;
use summary_vectors::{
    BatchUploader, EmbedStage, FormatStage, FsRecordStore, Orchestrator, StageKind, UploadStage,
};

#[derive(Parser, Debug)]
#[command(
    name = "sv-pipeline",
    about = "Embed, format, and upload the corpus in one run"
)]
struct PipelineCli {
    /// First stage to run
    #[arg(long, value_enum, default_value_t = StageKind::Embed)]
    from: StageKind,

    /// Last stage to run
    #[arg(long, value_enum, default_value_t = StageKind::Upload)]
    to: StageKind,

    #[command(flatten)]
    layout: LayoutArgs,

    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(flatten)]
    stage: EmbedStageArgs,

    #[command(flatten)]
    format: FormatArgs,

    #[command(flatten)]
    store: VectorStoreArgs,

    #[command(flatten)]
    upload: UploadArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = PipelineCli::parse();
    let range = cli.from..=cli.to;
    let records = FsRecordStore;

    // Remote clients are only configured for the stages that need them.
    let embed_stage = if range.contains(&StageKind::Embed) {
        let embedder = cli
            .embedder
            .build_embedder(Some(DEFAULT_INGEST_DIMENSIONS))
            .context("failed to configure embedding client")?;
        Some(EmbedStage::new(&records, embedder, cli.stage.options()))
    } else {
        None
    };
    let format_stage = FormatStage::new(&records, cli.format.formatter());
    let upload_stage = if range.contains(&StageKind::Upload) {
        let location = cli.store.build_config().location()?;
        let client = cli
            .store
            .build_client()
            .context("failed to configure vector store client")?;
        let uploader = BatchUploader::new(client, location, cli.upload.limits())?;
        Some(UploadStage::new(&records, uploader))
    } else {
        None
    };

    let mut orchestrator =
        Orchestrator::new(cli.layout.layout()).with_stage(StageKind::Format, &format_stage);
    if let Some(stage) = &embed_stage {
        orchestrator = orchestrator.with_stage(StageKind::Embed, stage);
    }
    if let Some(stage) = &upload_stage {
        orchestrator = orchestrator.with_stage(StageKind::Upload, stage);
    }

    let runs = orchestrator.run(cli.from, cli.to)?;
    for run in &runs {
        println!("{:?}: {} record(s)", run.kind, run.count);
    }
    println!("Done. Ran {} stage(s)", runs.len());
    Ok(())
}
