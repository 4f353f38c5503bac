//! Folder-scoped binary lookups for inline images and shared attachments.
use async_trait::async_trait;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = content_type_for(Path::new(&name)).to_string();
        Self {
            name,
            content_type,
            bytes,
        }
    }
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("cannot access folder {folder}")]
    FolderInaccessible {
        folder: String,
        #[source]
        source: Option<std::io::Error>,
    },
    #[error("cannot read {name} in folder {folder}: {source}")]
    Read {
        folder: String,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait BlobResolver: Send + Sync {
    /// Fails with `FolderInaccessible` when the folder cannot be listed.
    async fn ensure_folder(&self, folder: &str) -> Result<(), BlobError>;

    async fn resolve_by_name(&self, folder: &str, file_name: &str)
        -> Result<Option<Blob>, BlobError>;

    /// First regular file of the folder in name order.
    async fn resolve_first(&self, folder: &str) -> Result<Option<Blob>, BlobError>;
}

/// Folder handles are directories relative to `root`; absolute handles are
/// used as-is.
#[derive(Debug, Clone)]
pub struct FsBlobResolver {
    root: PathBuf,
}

impl FsBlobResolver {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    async fn folder_dir(&self, folder: &str) -> Result<PathBuf, BlobError> {
        let dir = self.root.join(folder.trim());
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(BlobError::FolderInaccessible {
                folder: folder.to_string(),
                source: None,
            }),
            Err(e) => Err(BlobError::FolderInaccessible {
                folder: folder.to_string(),
                source: Some(e),
            }),
        }
    }
}

#[async_trait]
impl BlobResolver for FsBlobResolver {
    async fn ensure_folder(&self, folder: &str) -> Result<(), BlobError> {
        self.folder_dir(folder).await.map(|_| ())
    }

    async fn resolve_by_name(
        &self,
        folder: &str,
        file_name: &str,
    ) -> Result<Option<Blob>, BlobError> {
        let dir = self.folder_dir(folder).await?;
        // Names come from sheet cells; only plain file names stay in the folder.
        if Path::new(file_name).file_name() != Some(OsStr::new(file_name))
            || file_name.contains('\\')
        {
            return Ok(None);
        }
        let path = dir.join(file_name);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(folder, file_name, bytes = bytes.len(), "blob resolved");
                Ok(Some(Blob::new(file_name, bytes)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BlobError::Read {
                folder: folder.to_string(),
                name: file_name.to_string(),
                source,
            }),
        }
    }

    async fn resolve_first(&self, folder: &str) -> Result<Option<Blob>, BlobError> {
        let dir = self.folder_dir(folder).await?;
        let inaccessible = |e: std::io::Error| BlobError::FolderInaccessible {
            folder: folder.to_string(),
            source: Some(e),
        };

        let mut entries = fs::read_dir(&dir).await.map_err(inaccessible)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(inaccessible)? {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let Some(first) = names.into_iter().next() else {
            return Ok(None);
        };
        let bytes = fs::read(dir.join(&first))
            .await
            .map_err(|source| BlobError::Read {
                folder: folder.to_string(),
                name: first.clone(),
                source,
            })?;
        Ok(Some(Blob::new(first, bytes)))
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "docx" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(ext) if ext == "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
