//! filekeep: file upload backend with soft-delete archiving
//!
//! Users upload files, list them and "delete" them. Deletion never destroys
//! data: the file moves from the active collection into an archive. The bytes
//! live in one of three interchangeable backends chosen at startup:
//!
//! - **local**: two directories on disk, with active files served statically
//! - **drive**: two Google Drive folders, authorized through OAuth2
//! - **cloudinary**: two folder prefixes of one Cloudinary cloud
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use filekeep::{config::FileKeepConfig, observability, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     observability::init()?;
//!
//!     let config = FileKeepConfig::load(None)?;
//!     server::serve(config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! # HTTP API
//!
//! | Endpoint | Method | Success |
//! |---|---|---|
//! | `/api/upload` | POST (multipart `files`) | `{ok, saved}` |
//! | `/api/files` | GET | `{files}` |
//! | `/api/move-to-respaldo/{id}` | POST | `{ok, movedTo}` |
//! | `/api/move-to-respaldo` | POST (`{public_id}`) | `{ok, moved_to}` |
//! | `/RECURSOS/{name}` | GET (local backend) | file bytes |
//! | `/health` | GET | `{status, backend}` |

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod oauth2;
pub mod observability;
pub mod server;
pub mod state;
pub mod storage;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use filekeep::prelude::*;
    //! ```

    // Configuration
    pub use crate::config::{BackendKind, FileKeepConfig};

    // Storage
    pub use crate::storage::{
        CloudinaryFileStorage, DriveFileStorage, FileStorage, LocalFileStorage, MovedFile,
        StorageError, StoredFile, UploadedFile,
    };

    // HTTP layer
    pub use crate::error::ApiError;
    pub use crate::extractors::{FileUploadError, MultiFileUpload};
    pub use crate::state::AppState;

    // Server
    pub use crate::server::{build_app, serve};
}
