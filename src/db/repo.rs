use super::model::{Sheet, SheetRow};
use crate::model::{ArchiveRecord, LogRecord, Marker};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn decode_cells(raw: &str, position: i64) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("row {} has malformed cells", position))
}

#[instrument(skip_all)]
pub async fn read_sheet(pool: &Pool) -> Result<Sheet> {
    let header: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sheet_header ORDER BY position ASC")
            .fetch_all(pool)
            .await?;

    let rows = sqlx::query("SELECT position, cells, marker FROM sheet_rows ORDER BY position ASC")
        .fetch_all(pool)
        .await?;

    let rows = rows
        .into_iter()
        .map(|row| {
            let position: i64 = row.get("position");
            let cells: String = row.get("cells");
            let marker: Option<String> = row.get("marker");
            Ok(SheetRow {
                cells: decode_cells(&cells, position)?,
                marker: Marker::from_color(marker.as_deref()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Sheet { header, rows })
}

/// Overwrite one cell of a body row and set the row's marker.
#[instrument(skip_all, fields(row = row, col = col))]
pub async fn write_cell(
    pool: &Pool,
    row: usize,
    col: usize,
    value: &str,
    marker: Marker,
) -> Result<()> {
    let position = row as i64;
    let mut tx = pool.begin().await?;
    let cells: Option<String> =
        sqlx::query_scalar("SELECT cells FROM sheet_rows WHERE position = ?")
            .bind(position)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(cells) = cells else {
        return Err(anyhow!("row {} not found", row));
    };

    let mut sheet_row = SheetRow {
        cells: decode_cells(&cells, position)?,
        marker,
    };
    sheet_row.set_cell(col, value);

    sqlx::query("UPDATE sheet_rows SET cells = ?, marker = ? WHERE position = ?")
        .bind(serde_json::to_string(&sheet_row.cells)?)
        .bind(marker.color())
        .bind(position)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Delete every body row and write `rows` back in order.
#[instrument(skip_all, fields(rows = rows.len()))]
pub async fn replace_body(pool: &Pool, rows: &[SheetRow]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM sheet_rows")
        .execute(&mut *tx)
        .await?;
    insert_rows_tx(&mut tx, rows).await?;
    tx.commit().await?;
    Ok(())
}

/// Replace header and body in one transaction.
#[instrument(skip_all)]
pub async fn load_sheet(pool: &Pool, sheet: &Sheet) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM sheet_header")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM sheet_rows")
        .execute(&mut *tx)
        .await?;
    for (position, name) in sheet.header.iter().enumerate() {
        sqlx::query("INSERT INTO sheet_header (position, name) VALUES (?, ?)")
            .bind(position as i64)
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }
    insert_rows_tx(&mut tx, &sheet.rows).await?;
    tx.commit().await?;
    Ok(())
}

async fn insert_rows_tx(tx: &mut Transaction<'_, Sqlite>, rows: &[SheetRow]) -> Result<()> {
    for (position, row) in rows.iter().enumerate() {
        sqlx::query("INSERT INTO sheet_rows (position, cells, marker) VALUES (?, ?, ?)")
            .bind(position as i64)
            .bind(serde_json::to_string(&row.cells)?)
            .bind(row.marker.color())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn append_log(pool: &Pool, record: &LogRecord) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO dispatch_log (logged_at, name, email, status, message) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(record.logged_at)
    .bind(&record.name)
    .bind(&record.email)
    .bind(&record.status)
    .bind(&record.message)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn append_archive(pool: &Pool, record: &ArchiveRecord) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO archive (archived_at, name, academic_year, gender, email, status, message) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(record.archived_at)
    .bind(&record.name)
    .bind(&record.academic_year)
    .bind(&record.gender)
    .bind(&record.email)
    .bind(&record.status)
    .bind(&record.message)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

pub async fn list_log(pool: &Pool) -> Result<Vec<LogRecord>> {
    let rows = sqlx::query(
        "SELECT logged_at, name, email, status, message FROM dispatch_log ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| LogRecord {
            logged_at: row.get::<DateTime<Utc>, _>("logged_at"),
            name: row.get("name"),
            email: row.get("email"),
            status: row.get("status"),
            message: row.get("message"),
        })
        .collect())
}

pub async fn list_archive(pool: &Pool) -> Result<Vec<ArchiveRecord>> {
    let rows = sqlx::query(
        "SELECT archived_at, name, academic_year, gender, email, status, message FROM archive ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| ArchiveRecord {
            archived_at: row.get::<DateTime<Utc>, _>("archived_at"),
            name: row.get("name"),
            academic_year: row.get("academic_year"),
            gender: row.get("gender"),
            email: row.get("email"),
            status: row.get("status"),
            message: row.get("message"),
        })
        .collect())
}
