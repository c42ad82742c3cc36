//! Stage 2: reshape embedded records into vector-store input files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use summary_vectors::cli::FormatArgs;
use summary_vectors::telemetry::init_tracing;
use summary_vectors::{FormatStage, FsRecordStore, Stage};

#[derive(Parser, Debug)]
#[command(
    name = "sv-format",
    about = "Convert embedded records into vector-store input files"
)]
struct FormatCli {
    /// Directory of `{id}-embed.json` files
    #[arg(long, env = "EMBEDDED_DIR", default_value = "articles-embed")]
    input: PathBuf,

    /// Directory receiving `{id}-vectors.json` files
    #[arg(long, env = "VECTOR_INPUT_DIR", default_value = "articles-vectors")]
    output: PathBuf,

    #[command(flatten)]
    format: FormatArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = FormatCli::parse();

    let records = FsRecordStore;
    let count = FormatStage::new(&records, cli.format.formatter())
        .run(&cli.input, &cli.output)
        .with_context(|| format!("formatting {} failed", cli.input.display()))?;

    println!(
        "Done. Wrote {} vector input file(s) to {}",
        count,
        cli.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        FormatCli::command().debug_assert();
    }
}
