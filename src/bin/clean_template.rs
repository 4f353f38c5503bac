use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use batch_mailer::template::clean_exported;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Strip document titles and the gender marker line from an exported HTML template"
)]
struct Args {
    /// Exported HTML document
    #[arg(long)]
    input: PathBuf,

    /// Cleaned output; defaults to overwriting the input
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let html = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("cannot read {}", args.input.display()))?;
    let cleaned = clean_exported(&html);

    let out = args.output.unwrap_or_else(|| args.input.clone());
    tokio::fs::write(&out, &cleaned)
        .await
        .with_context(|| format!("cannot write {}", out.display()))?;
    info!(
        input = %args.input.display(),
        output = %out.display(),
        removed = html.len().saturating_sub(cleaned.len()),
        "template cleaned"
    );
    Ok(())
}
