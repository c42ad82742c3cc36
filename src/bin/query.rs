//! Stage 4: embed a query and print its nearest stored documents.

use anyhow::{Context, Result};
use clap::Parser;
use summary_vectors::cli::{EmbedderArgs, VectorStoreArgs};
use summary_vectors::telemetry::init_tracing;
use summary_vectors::{render_results, QueryEngine, QueryMatch};

#[derive(Parser, Debug)]
#[command(
    name = "sv-query",
    about = "Run a top-K similarity query against the vector index"
)]
struct QueryCli {
    /// Text to search for
    #[arg(long, short, env = "QUERY_TEXT", default_value = "恋をしたい")]
    query: String,

    /// Number of neighbours to return
    #[arg(long, env = "QUERY_TOP_K", default_value_t = 5)]
    top_k: usize,

    /// Print the results as JSON instead of ranked lines
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Query-side model override; wins over `--embed-model` when set
    #[arg(long, env = "BEDROCK_TEXT_EMBED_MODEL")]
    query_model: Option<String>,

    #[command(flatten)]
    embedder: EmbedderArgs,

    #[command(flatten)]
    store: VectorStoreArgs,
}

impl QueryCli {
    /// Embedder options with the query-side model applied.
    fn embedder_args(&self) -> EmbedderArgs {
        let mut args = self.embedder.clone();
        if let Some(model) = self
            .query_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
        {
            args.embed_model = model.to_string();
        }
        args
    }
}

/// Stdout and stderr text for `hits`; in JSON mode stdout holds only the
/// JSON document and the summary line goes to stderr.
fn report(hits: &[QueryMatch], json: bool) -> Result<(String, String)> {
    let done = format!("Done. {} result(s)\n", hits.len());
    if json {
        let body = serde_json::to_string_pretty(hits)?;
        Ok((format!("{body}\n"), done))
    } else {
        Ok((format!("{}{done}", render_results(hits)), String::new()))
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = QueryCli::parse();

    let location = cli.store.build_config().location()?;
    let client = cli
        .store
        .build_client()
        .context("failed to configure vector store client")?;
    let embedder = cli
        .embedder_args()
        .build_embedder(None)
        .context("failed to configure embedding client")?;
    let engine = QueryEngine::new(embedder, client, location);
    let hits = engine
        .query(&cli.query, cli.top_k)
        .with_context(|| format!("query {:?} failed", cli.query))?;

    let (stdout, stderr) = report(&hits, cli.json)?;
    print!("{stdout}");
    eprint!("{stderr}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        QueryCli::command().debug_assert();
    }

    #[test]
    fn query_model_overrides_embed_model() {
        let cli = QueryCli::try_parse_from([
            "sv-query",
            "--embed-model",
            "ingest-model",
            "--query-model",
            "query-model",
        ])
        .expect("parse");
        assert_eq!(cli.embedder_args().embed_model, "query-model");

        let cli = QueryCli::try_parse_from([
            "sv-query",
            "--embed-model",
            "ingest-model",
            "--query-model",
            " ",
        ])
        .expect("parse");
        assert_eq!(cli.embedder_args().embed_model, "ingest-model");
    }

    fn hits() -> Vec<QueryMatch> {
        vec![QueryMatch {
            id: "doc-1".into(),
            distance: Some(0.25),
            metadata: None,
        }]
    }

    #[test]
    fn json_mode_keeps_stdout_parseable_and_reports_done_on_stderr() {
        let (stdout, stderr) = report(&hits(), true).expect("report");
        let parsed: Vec<QueryMatch> = serde_json::from_str(&stdout).expect("json stdout");
        assert_eq!(parsed, hits());
        assert_eq!(stderr, "Done. 1 result(s)\n");
    }

    #[test]
    fn text_mode_ends_with_done_line() {
        let (stdout, stderr) = report(&hits(), false).expect("report");
        assert!(stdout.starts_with("1. key=doc-1, distance=0.2500"));
        assert!(stdout.ends_with("Done. 1 result(s)\n"));
        assert!(stderr.is_empty());
    }
}
