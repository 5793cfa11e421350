//! Local filesystem storage implementation

use super::sanitize::{archive_collision_name, display_name, is_reserved, storage_key, unique_token};
use super::traits::FileStorage;
use super::types::{MovedFile, StorageError, StorageResult, StoredFile, UploadedFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage backend
///
/// Active files live flat in one directory and archived files in another.
/// The storage key (and `id`) of a file is its generated file name.
///
/// # Directory Structure
///
/// ```text
/// RECURSOS/
/// ├── 1718000000000_report.pdf
/// └── logo_header.png          (reserved, never listed)
/// RESPALDO/
/// ├── 1717000000000_old.txt
/// └── 1717000000000_old_respaldo_1718000000123.txt
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    active_dir: PathBuf,
    archive_dir: PathBuf,
    public_prefix: String,
}

/// Bytes and modification time of an active file, for static serving
#[derive(Debug, Clone)]
pub struct ActiveFileContent {
    /// Final file name
    pub name: String,
    /// File contents
    pub data: Vec<u8>,
    /// Last modification time
    pub modified: SystemTime,
}

impl LocalFileStorage {
    /// Creates a local storage instance, creating both directories if needed
    ///
    /// `public_prefix` is the URL path the active directory is served under.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - either path exists but is not a directory
    /// - a directory cannot be created
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use filekeep::storage::LocalFileStorage;
    ///
    /// let storage = LocalFileStorage::new("./RECURSOS", "./RESPALDO", "/RECURSOS")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        active_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        public_prefix: impl Into<String>,
    ) -> StorageResult<Self> {
        let active_dir = active_dir.into();
        let archive_dir = archive_dir.into();

        // Synchronous setup is fine at startup
        for dir in [&active_dir, &archive_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(StorageError::InvalidPath(format!(
                    "{} is not a directory",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            active_dir,
            archive_dir,
            public_prefix: public_prefix.into(),
        })
    }

    /// Directory holding active files
    #[must_use]
    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    /// Directory holding archived files
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Reduces a client-supplied id to a bare file name
    ///
    /// Anything that does not name a single path component is rejected as
    /// not found, which keeps lookups inside the active directory.
    fn file_name_of(id: &str) -> StorageResult<String> {
        Path::new(id)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn record(
        &self,
        key: String,
        created_at: Option<DateTime<Utc>>,
        size: Option<u64>,
    ) -> StoredFile {
        let content_type = mime_guess::from_path(&key).first().map(|m| m.to_string());
        let mut stored = StoredFile::active(key.clone(), display_name(&key), String::new())
            .with_created_at(created_at)
            .with_content_type(content_type)
            .with_size(size);
        stored.access_url = self.resolve_url(&stored);
        stored
    }

    /// Checked rename for filesystems without hard links
    ///
    /// The existence check and the rename are separate steps here; collision
    /// names carry a fresh token, so two moves never pick the same target.
    async fn rename_into_archive(&self, name: &str, from: &Path) -> StorageResult<MovedFile> {
        let mut target = name.to_string();
        while fs::try_exists(self.archive_dir.join(&target)).await? {
            target = archive_collision_name(name, unique_token());
        }

        fs::rename(from, self.archive_dir.join(&target)).await?;
        tracing::info!(from = %name, to = %target, "Moved file to archive");

        Ok(MovedFile {
            id: target.clone(),
            name: target,
        })
    }

    /// Reads an active file for static serving
    ///
    /// Reserved assets are served too; they are only hidden from listings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such file exists in the active
    /// directory.
    pub async fn read_active(&self, id: &str) -> StorageResult<ActiveFileContent> {
        let name = Self::file_name_of(id)?;
        let path = self.active_dir.join(&name);

        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(StorageError::NotFound(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(name)),
            Err(e) => return Err(e.into()),
        };

        let data = fs::read(&path).await?;
        Ok(ActiveFileContent {
            name,
            data,
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
        })
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, file: UploadedFile) -> StorageResult<StoredFile> {
        loop {
            let key = storage_key(&file.filename, unique_token());
            let path = self.active_dir.join(&key);

            // create_new never clobbers a file another request just wrote
            let mut handle = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(handle) => handle,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let written = async {
                handle.write_all(&file.data).await?;
                handle.flush().await
            }
            .await;

            if let Err(e) = written {
                drop(handle);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial upload");
                }
                return Err(e.into());
            }

            tracing::debug!(key = %key, size = file.size(), "Stored file on disk");
            return Ok(self.record(key, Some(Utc::now()), Some(file.size())));
        }
    }

    async fn list(&self) -> StorageResult<Vec<StoredFile>> {
        let mut entries = fs::read_dir(&self.active_dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if is_reserved(&name) {
                continue;
            }

            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            files.push(self.record(name, created_at, Some(metadata.len())));
        }

        // Newest first; name breaks ties so one listing is stable
        files.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(files)
    }

    async fn move_to_archive(&self, id: &str) -> StorageResult<MovedFile> {
        let name = Self::file_name_of(id)?;
        if is_reserved(&name) {
            return Err(StorageError::NotFound(name));
        }

        let from = self.active_dir.join(&name);
        match fs::metadata(&from).await {
            Ok(m) if m.is_file() => {}
            Ok(_) => return Err(StorageError::NotFound(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(name)),
            Err(e) => return Err(e.into()),
        }

        // hard_link fails with AlreadyExists instead of replacing the target
        let mut target = name.clone();
        loop {
            match fs::hard_link(&from, self.archive_dir.join(&target)).await {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    target = archive_collision_name(&name, unique_token());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(StorageError::NotFound(name));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Hard link unavailable, renaming instead");
                    return self.rename_into_archive(&name, &from).await;
                }
            }
        }

        if let Err(e) = fs::remove_file(&from).await {
            let linked = self.archive_dir.join(&target);
            if let Err(cleanup) = fs::remove_file(&linked).await {
                tracing::warn!(path = %linked.display(), error = %cleanup, "Failed to undo archive link");
            }
            return Err(e.into());
        }

        tracing::info!(from = %name, to = %target, "Moved file to archive");
        Ok(MovedFile {
            id: target.clone(),
            name: target,
        })
    }

    fn resolve_url(&self, file: &StoredFile) -> String {
        format!(
            "{}/{}",
            self.public_prefix.trim_end_matches('/'),
            urlencoding::encode(&file.id)
        )
    }
}
