//! File storage trait definitions

use super::types::{MovedFile, StorageResult, StoredFile, UploadedFile};
use async_trait::async_trait;

/// Abstraction over where file bytes and metadata live
///
/// One implementation is selected per deployment (local disk, Google Drive or
/// Cloudinary). Request handlers are generic over this trait and never branch
/// on the concrete backend.
///
/// # Contract
///
/// - `put` assigns a fresh, unique `id` and the file is listable immediately.
/// - `list` returns only active files, never reserved `logo_` assets, newest
///   first when the backend knows creation times.
/// - `move_to_archive` relocates an active file into the archive, renaming it
///   when the archive key is taken. Archived data is never overwritten and
///   nothing is ever hard-deleted.
///
/// # Examples
///
/// ```rust,no_run
/// use filekeep::storage::{FileStorage, LocalFileStorage, UploadedFile};
///
/// # async fn example() -> anyhow::Result<()> {
/// let storage = LocalFileStorage::new("./RECURSOS", "./RESPALDO", "/RECURSOS")?;
///
/// let stored = storage.put(UploadedFile::new("report.pdf", "application/pdf", vec![])).await?;
/// let listed = storage.list().await?;
/// assert!(listed.iter().any(|f| f.id == stored.id));
///
/// let moved = storage.move_to_archive(&stored.id).await?;
/// println!("archived as {}", moved.name);
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    /// Short backend name used in logs and the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Fails with `StorageError::Unauthorized` when the backend has no usable
    /// credential
    ///
    /// Handlers call this before any other operation. Backends without
    /// credentials keep the default.
    async fn ensure_authorized(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Stores an uploaded file in the active collection
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write or is unreachable
    async fn put(&self, file: UploadedFile) -> StorageResult<StoredFile>;

    /// Lists the active collection
    ///
    /// An empty collection is an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated
    async fn list(&self) -> StorageResult<Vec<StoredFile>>;

    /// Moves an active file into the archive
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` when `id` is not in the active collection
    /// - any backend error from the relocation itself, in which case the file
    ///   stays active
    async fn move_to_archive(&self, id: &str) -> StorageResult<MovedFile>;

    /// Returns the URL content can be fetched from
    ///
    /// Local files resolve to a percent-encoded static path; remote files
    /// return the provider URL unchanged.
    fn resolve_url(&self, file: &StoredFile) -> String;
}
