use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use batch_mailer::blob::FsBlobResolver;
use batch_mailer::config;
use batch_mailer::db;
use batch_mailer::mailer::SmtpMailer;
use batch_mailer::model::Status;
use batch_mailer::template::FsTemplateStore;
use batch_mailer::{BatchResult, Dispatcher, SqliteStore};

#[derive(Debug, Parser)]
#[command(author, version, about = "Send one batch of scheduled mail and exit")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Evaluate the send-time gate against this instant instead of now
    #[arg(long)]
    now: Option<String>,
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
    cfg.ensure_dirs()?;

    let now: DateTime<Local> = match args.now.as_deref() {
        Some(raw) => config::parse_send_time(raw)
            .with_context(|| format!("cannot parse --now value {:?}", raw))?,
        None => Local::now(),
    };

    let pool = db::init_pool(&cfg.resolved_database_url()).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let dispatcher = Dispatcher::new(
        store.clone(),
        store,
        Arc::new(FsTemplateStore::new(&cfg.app.templates_dir)),
        Arc::new(FsBlobResolver::new(&cfg.app.assets_dir)),
        Arc::new(SmtpMailer::from_config(&cfg)?),
    );

    match dispatcher.run_batch(&cfg.campaign, now).await {
        Ok(BatchResult::NotDue) => info!("send time not reached, nothing to do"),
        Ok(BatchResult::NothingEligible) => info!("no eligible recipients, nothing to do"),
        Ok(BatchResult::Completed(report)) => info!(
            run_id = %report.run_id,
            sent = report.count(Status::Successful),
            failed = report.count(Status::Failed),
            drafts = report.count(Status::Draft),
            remaining = report.compaction.retained,
            "batch complete"
        ),
        Err(err) => {
            error!(%err, "batch aborted");
            return Err(err.into());
        }
    }
    Ok(())
}
