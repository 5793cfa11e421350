//! Core types for file storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during file storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// File not found in the active collection
    #[error("File not found: {0}")]
    NotFound(String),

    /// I/O error during storage operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file path or identifier
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The backend has no usable credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Required deployment configuration is absent
    #[error("Storage misconfigured: {0}")]
    Misconfigured(String),

    /// Transport failure talking to a remote provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote provider answered with an error status
    #[error("Provider returned {status}: {message}")]
    Provider {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider error message
        message: String,
    },

    /// Generic storage error
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Logical folder holding a stored file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Visible to end users through listing
    Active,
    /// Moved out of the active collection by soft-delete
    Archived,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Archived => f.write_str("archived"),
        }
    }
}

/// A file that has been uploaded but not yet stored
///
/// # Examples
///
/// ```rust
/// use filekeep::storage::UploadedFile;
///
/// let file = UploadedFile::new("report.pdf", "application/pdf", vec![0x25, 0x50, 0x44, 0x46]);
/// assert_eq!(file.size(), 4);
/// assert_eq!(file.extension(), Some("pdf"));
/// ```
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename from the upload
    pub filename: String,

    /// MIME content type (e.g., "image/png", "application/pdf")
    pub content_type: String,

    /// File data as bytes
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Creates a new uploaded file
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Returns the size of the file in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Extracts the file extension from the filename
    ///
    /// Returns `None` if the filename has no extension
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

/// A file tracked by a storage backend
///
/// `id` is backend-specific: the generated file name on disk, a Drive file id,
/// or a Cloudinary public id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    /// Unique identifier within the backend
    pub id: String,

    /// Human-readable file name
    #[serde(rename = "name")]
    pub display_name: String,

    /// Which collection currently holds the file
    pub location: Location,

    /// URL or path the content bytes can be fetched from
    #[serde(rename = "url")]
    pub access_url: String,

    /// Creation time, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// MIME content type, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Size in bytes, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl StoredFile {
    /// Creates an active file record with no optional metadata
    #[must_use]
    pub fn active(
        id: impl Into<String>,
        display_name: impl Into<String>,
        access_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            location: Location::Active,
            access_url: access_url.into(),
            created_at: None,
            content_type: None,
            size: None,
        }
    }

    /// Sets the creation time
    #[must_use]
    pub const fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sets the content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the size in bytes
    #[must_use]
    pub const fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }
}

impl fmt::Display for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoredFile(id={}, name={}, location={})",
            self.id, self.display_name, self.location
        )
    }
}

/// Outcome of moving a file into the archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovedFile {
    /// Identifier of the file in the archive
    pub id: String,

    /// Final key (file name or public id) in the archive
    pub name: String,
}
