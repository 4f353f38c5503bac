use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use batch_mailer::blob::FsBlobResolver;
use batch_mailer::template::{FsTemplateStore, TemplatePair};
use batch_mailer::{config, db, preview, SqliteStore};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Render every recipient into one HTML page and mark rows ready"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Where to write the preview page
    #[arg(long, default_value = "preview.html")]
    out: PathBuf,
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

    let pool = db::init_pool(&cfg.resolved_database_url()).await?;
    db::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);

    let templates_store = FsTemplateStore::new(&cfg.app.templates_dir);
    let templates = TemplatePair::load(&templates_store, &cfg.campaign).await?;
    let blobs = FsBlobResolver::new(&cfg.app.assets_dir);

    let report = preview::preview(&cfg.campaign, &templates, &store, &blobs).await?;
    tokio::fs::write(&args.out, &report.html).await?;
    info!(
        out = %args.out.display(),
        ready = report.ready,
        missing_images = report.missing_images,
        "preview written"
    );
    Ok(())
}
