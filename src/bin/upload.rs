//! Stage 3: upsert vector-store input files into the index.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use summary_vectors::cli::{UploadArgs, VectorStoreArgs};
use summary_vectors::telemetry::init_tracing;
use summary_vectors::{BatchUploader, FsRecordStore, Stage, UploadStage};

#[derive(Parser, Debug)]
#[command(
    name = "sv-upload",
    about = "Upload vector input files to the vector index"
)]
struct UploadCli {
    /// Directory of `{id}-vectors.json` files
    #[arg(long, env = "VECTOR_INPUT_DIR", default_value = "articles-vectors")]
    input: PathBuf,

    #[command(flatten)]
    store: VectorStoreArgs,

    #[command(flatten)]
    upload: UploadArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = UploadCli::parse();

    let config = cli.store.build_config();
    let location = config.location()?;
    let client = cli
        .store
        .build_client()
        .context("failed to configure vector store client")?;
    let uploader = BatchUploader::new(client, location.clone(), cli.upload.limits())?;
    let records = FsRecordStore;
    let count = UploadStage::new(&records, uploader)
        .run(&cli.input, Path::new(""))
        .with_context(|| format!("uploading {} failed", cli.input.display()))?;

    println!(
        "Done. Inserted/updated {} vector(s) in {}/{}",
        count,
        location.bucket(),
        location.index()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        UploadCli::command().debug_assert();
    }
}
