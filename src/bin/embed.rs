//! Stage 1: embed every corpus summary into `{id}-embed.json` checkpoints.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use summary_vectors::cli::{EmbedStageArgs, EmbedderArgs};
use summary_vectors::config::DEFAULT_INGEST_DIMENSIONS;
use summary_vectors::telemetry::init_tracing;
use summary_vectors::{EmbedStage, FsRecordStore};

#[derive(Parser, Debug)]
#[command(
    name = "sv-embed",
    about = "Embed document summaries and write embedded records"
)]
struct EmbedCli {
    /// Directory of raw document JSON files
    #[arg(long, env = "CORPUS_DIR", default_value = "articles")]
    input: PathBuf,

    /// Directory receiving `{id}-embed.json` files
    #[arg(long, env = "EMBEDDED_DIR", default_value = "articles-embed")]
    output: PathBuf,

    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(flatten)]
    stage: EmbedStageArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = EmbedCli::parse();

    let embedder = cli
        .embedder
        .build_embedder(Some(DEFAULT_INGEST_DIMENSIONS))
        .context("failed to configure embedding client")?;
    let records = FsRecordStore;
    let stage = EmbedStage::new(&records, embedder, cli.stage.options());
    let report = stage
        .run_report(&cli.input, &cli.output)
        .with_context(|| format!("embedding {} failed", cli.input.display()))?;

    if !report.skipped.is_empty() {
        println!(
            "Skipped {} invalid document(s): {}",
            report.skipped.len(),
            report.skipped.join(", ")
        );
    }
    println!(
        "Done. Embedded {} document(s) into {}",
        report.written,
        cli.output.display()
    );
    Ok(())
}
