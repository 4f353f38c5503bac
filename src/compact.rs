//! Post-batch pool compaction.
use crate::db::SheetRow;
use crate::model::is_retained;
use crate::store::RecipientStore;
use anyhow::{anyhow, Result};
use tracing::{info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionSummary {
    pub retained: usize,
    pub purged: usize,
}

/// Split rows into (kept, dropped), both in original order. Kept rows have
/// an empty, pending or failed status.
pub fn partition_rows(rows: Vec<SheetRow>, status_col: usize) -> (Vec<SheetRow>, Vec<SheetRow>) {
    rows.into_iter()
        .partition(|row| is_retained(row.cell(status_col)))
}

/// Rewrite the whole body keeping only retryable or untouched rows. Row
/// positions change; any row index taken before this call is stale after it.
#[instrument(skip_all)]
pub async fn compact(store: &dyn RecipientStore) -> Result<CompactionSummary> {
    let sheet = store.read_sheet().await?;
    let status_col = sheet
        .normalized_header()
        .iter()
        .position(|h| h == "status")
        .ok_or_else(|| anyhow!("status column missing from recipient sheet"))?;
    if sheet.rows.is_empty() {
        return Ok(CompactionSummary::default());
    }

    let (kept, dropped) = partition_rows(sheet.rows, status_col);
    let summary = CompactionSummary {
        retained: kept.len(),
        purged: dropped.len(),
    };
    store.replace_body(kept).await?;
    info!(
        retained = summary.retained,
        purged = summary.purged,
        "recipient sheet compacted"
    );
    Ok(summary)
}
