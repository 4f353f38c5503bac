use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use batch_mailer::import::{self, ImportFile};
use batch_mailer::{config, db, SqliteStore};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Replace the recipient sheet with validated rows from a YAML file"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// YAML file with `header` and `rows`
    #[arg(long)]
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let file: ImportFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("cannot parse {}", args.file.display()))?;
    let outcome = import::validate(&file)?;

    if outcome.sheet.rows.is_empty() {
        warn!("no valid rows; recipient sheet left unchanged");
        return Ok(());
    }

    let pool = db::init_pool(&cfg.resolved_database_url()).await?;
    db::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);
    store.load_sheet(&outcome.sheet).await?;

    info!(
        imported = outcome.sheet.rows.len(),
        skipped = outcome.issues.len(),
        "recipients imported"
    );
    Ok(())
}
