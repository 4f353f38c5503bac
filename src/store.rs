//! Storage seams used by the dispatcher: the recipient sheet and the
//! append-only log/archive journal.
use crate::db::{self, Pool, Sheet, SheetRow};
use crate::model::{ArchiveRecord, LogRecord, Marker};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn read_sheet(&self) -> Result<Sheet>;

    async fn write_cell(&self, row: usize, col: usize, value: &str, marker: Marker)
        -> Result<()>;

    /// Full delete-and-rewrite of the body below the header.
    async fn replace_body(&self, rows: Vec<SheetRow>) -> Result<()>;
}

#[async_trait]
pub trait Journal: Send + Sync {
    async fn append_log(&self, record: &LogRecord) -> Result<()>;

    async fn append_archive(&self, record: &ArchiveRecord) -> Result<()>;
}

/// SQLite-backed sheet and journal.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Replace header and body, e.g. from an import.
    pub async fn load_sheet(&self, sheet: &Sheet) -> Result<()> {
        db::load_sheet(&self.pool, sheet).await
    }
}

#[async_trait]
impl RecipientStore for SqliteStore {
    async fn read_sheet(&self) -> Result<Sheet> {
        db::read_sheet(&self.pool).await
    }

    async fn write_cell(
        &self,
        row: usize,
        col: usize,
        value: &str,
        marker: Marker,
    ) -> Result<()> {
        db::write_cell(&self.pool, row, col, value, marker).await
    }

    async fn replace_body(&self, rows: Vec<SheetRow>) -> Result<()> {
        db::replace_body(&self.pool, &rows).await
    }
}

#[async_trait]
impl Journal for SqliteStore {
    async fn append_log(&self, record: &LogRecord) -> Result<()> {
        db::append_log(&self.pool, record).await?;
        Ok(())
    }

    async fn append_archive(&self, record: &ArchiveRecord) -> Result<()> {
        db::append_archive(&self.pool, record).await?;
        Ok(())
    }
}
