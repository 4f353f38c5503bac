#![allow(dead_code)]

use async_trait::async_trait;
use batch_mailer::blob::{Blob, BlobError, BlobResolver};
use batch_mailer::config::Settings;
use batch_mailer::db::{Sheet, SheetRow};
use batch_mailer::mailer::{Mailer, OutgoingMessage, SendError};
use batch_mailer::pacing::Pacer;
use batch_mailer::template::FsTemplateStore;
use batch_mailer::{Dispatcher, SqliteStore};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

pub const HEADER: [&str; 5] = ["Email", "Name", "Gender", "Status", "Academic_Year"];
pub const STATUS_COL: usize = 3;

pub async fn setup_store() -> Arc<SqliteStore> {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

pub fn sheet<'a, R: AsRef<[&'a str]>>(header: &[&str], rows: &[R]) -> Sheet {
    Sheet {
        header: header.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| SheetRow::new(r.as_ref().iter().map(|c| c.to_string()).collect()))
            .collect(),
    }
}

/// Due, no images, no attachment, default batch and delays.
pub fn settings() -> Settings {
    Settings {
        subject: "Welcome".into(),
        send_time: Some("2000-01-01 08:00".into()),
        template_male: "male.html".into(),
        template_female: "female.html".into(),
        ..Default::default()
    }
}

pub fn template_dir() -> TempDir {
    let td = tempfile::tempdir().unwrap();
    std::fs::write(td.path().join("male.html"), "<p>Dear Mr {0}</p>").unwrap();
    std::fs::write(
        td.path().join("female.html"),
        "<style>p{}</style><p>Dear Ms {0}</p>",
    )
    .unwrap();
    td
}

#[derive(Clone, Default)]
pub struct RecordingMailer {
    responses: Arc<Mutex<VecDeque<Result<(), SendError>>>>,
    draft_responses: Arc<Mutex<VecDeque<Result<(), SendError>>>>,
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    drafts: Arc<Mutex<Vec<OutgoingMessage>>>,
}

impl RecordingMailer {
    pub fn with_responses(responses: Vec<Result<(), SendError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub async fn fail_drafts(&self, responses: Vec<Result<(), SendError>>) {
        *self.draft_responses.lock().await = VecDeque::from(responses);
    }

    /// Every send attempt, including ones that failed.
    pub async fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn drafts(&self) -> Vec<OutgoingMessage> {
        self.drafts.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        self.sent.lock().await.push(message.clone());
        self.responses.lock().await.pop_front().unwrap_or(Ok(()))
    }

    async fn save_draft(&self, message: &OutgoingMessage) -> Result<(), SendError> {
        let response = self.draft_responses.lock().await.pop_front().unwrap_or(Ok(()));
        if response.is_ok() {
            self.drafts.lock().await.push(message.clone());
        }
        response
    }
}

/// Folders that exist map to their blobs; anything else is inaccessible.
#[derive(Clone, Default)]
pub struct MemoryBlobs {
    folders: Arc<Mutex<HashMap<String, Vec<Blob>>>>,
}

impl MemoryBlobs {
    pub async fn folder(&self, folder: &str) {
        self.folders
            .lock()
            .await
            .entry(folder.to_string())
            .or_default();
    }

    pub async fn put(&self, folder: &str, name: &str, bytes: &[u8]) {
        self.folders
            .lock()
            .await
            .entry(folder.to_string())
            .or_default()
            .push(Blob::new(name, bytes.to_vec()));
    }

    async fn list(&self, folder: &str) -> Result<Vec<Blob>, BlobError> {
        self.folders
            .lock()
            .await
            .get(folder)
            .cloned()
            .ok_or_else(|| BlobError::FolderInaccessible {
                folder: folder.to_string(),
                source: None,
            })
    }
}

#[async_trait]
impl BlobResolver for MemoryBlobs {
    async fn ensure_folder(&self, folder: &str) -> Result<(), BlobError> {
        self.list(folder).await.map(|_| ())
    }

    async fn resolve_by_name(
        &self,
        folder: &str,
        file_name: &str,
    ) -> Result<Option<Blob>, BlobError> {
        Ok(self
            .list(folder)
            .await?
            .into_iter()
            .find(|b| b.name == file_name))
    }

    async fn resolve_first(&self, folder: &str) -> Result<Option<Blob>, BlobError> {
        let mut blobs = self.list(folder).await?;
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs.into_iter().next())
    }
}

#[derive(Clone, Default)]
pub struct RecordingPacer {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingPacer {
    pub async fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().await.clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, delay: Duration) {
        self.pauses.lock().await.push(delay);
    }
}

/// A dispatcher wired to an in-memory store and recording fakes.
pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub mailer: RecordingMailer,
    pub blobs: MemoryBlobs,
    pub pacer: RecordingPacer,
    pub templates: TempDir,
}

impl Harness {
    pub async fn new<'a, R: AsRef<[&'a str]>>(header: &[&str], rows: &[R]) -> Self {
        Self::with_mailer(header, rows, RecordingMailer::default()).await
    }

    pub async fn with_mailer<'a, R: AsRef<[&'a str]>>(
        header: &[&str],
        rows: &[R],
        mailer: RecordingMailer,
    ) -> Self {
        let store = setup_store().await;
        store.load_sheet(&sheet(header, rows)).await.unwrap();
        Self {
            store,
            mailer,
            blobs: MemoryBlobs::default(),
            pacer: RecordingPacer::default(),
            templates: template_dir(),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.store.clone(),
            self.store.clone(),
            Arc::new(FsTemplateStore::new(self.templates.path())),
            Arc::new(self.blobs.clone()),
            Arc::new(self.mailer.clone()),
        )
        .with_pacer(Arc::new(self.pacer.clone()))
    }

    pub async fn sheet(&self) -> Sheet {
        batch_mailer::db::read_sheet(self.store.pool()).await.unwrap()
    }

    /// (email, status) per row, in order.
    pub async fn rows(&self) -> Vec<(String, String)> {
        self.sheet()
            .await
            .rows
            .iter()
            .map(|r| (r.cell(0).to_string(), r.cell(STATUS_COL).to_string()))
            .collect()
    }
}

pub fn pairs(rows: &[(&str, &str)]) -> Vec<(String, String)> {
    rows.iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}
