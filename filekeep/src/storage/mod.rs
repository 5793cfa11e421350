//! File storage abstraction and implementations
//!
//! Three interchangeable backends sit behind the [`FileStorage`] trait:
//! - Local filesystem: two flat directories, served as static files
//! - Google Drive: two folders of one Drive account, accessed through OAuth2
//! - Cloudinary: two folder prefixes of one cloud
//!
//! Every backend keeps an *active* collection that users see and an *archive*
//! collection that soft-deleted files move into. Nothing is ever hard-deleted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use filekeep::storage::{FileStorage, LocalFileStorage, UploadedFile};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = LocalFileStorage::new("./RECURSOS", "./RESPALDO", "/RECURSOS")?;
//!
//! let stored = storage
//!     .put(UploadedFile::new("avatar.png", "image/png", vec![/* ... */]))
//!     .await?;
//! println!("Stored file: {}", stored.id);
//!
//! // Soft-delete
//! storage.move_to_archive(&stored.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod cloudinary;
mod drive;
mod http;
mod local;
pub mod sanitize;
mod traits;
mod types;

pub use cloudinary::CloudinaryFileStorage;
pub use drive::DriveFileStorage;
pub use local::{ActiveFileContent, LocalFileStorage};
#[cfg(test)]
pub use traits::MockFileStorage;
pub use traits::FileStorage;
pub use types::{Location, MovedFile, StorageError, StorageResult, StoredFile, UploadedFile};
