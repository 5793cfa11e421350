//! Multipart upload extractor
//!
//! Collects every file sent under the `files` form field, in the order the
//! client sent them. Per-file size and file-count limits come from
//! [`UploadSettings`], which the extractor pulls out of the router state.
//!
//! # Example
//!
//! ```rust,no_run
//! use filekeep::extractors::MultiFileUpload;
//! use axum::response::IntoResponse;
//!
//! async fn handler(MultiFileUpload(files): MultiFileUpload) -> impl IntoResponse {
//!     format!("Received {} files", files.len())
//! }
//! ```

use axum::{
    extract::{multipart::Field, FromRef, FromRequest, Multipart, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::UploadSettings;
use crate::storage::UploadedFile;

/// Form field carrying the uploaded files
pub const FILES_FIELD: &str = "files";

/// Error types for file upload parsing
#[derive(Debug, Error)]
pub enum FileUploadError {
    /// No file under the `files` field
    #[error("No files uploaded")]
    MissingFile,

    /// Malformed multipart body
    #[error("Multipart error: {0}")]
    MultipartError(String),

    /// A file exceeds the per-file limit
    #[error("File {name} exceeds maximum of {max} bytes")]
    FileTooLarge {
        /// Client-supplied file name
        name: String,
        /// Maximum allowed
        max: usize,
    },

    /// The request body exceeds the overall limit
    #[error("Upload exceeds the request size limit")]
    PayloadTooLarge,

    /// More files than allowed in one request
    #[error("Upload contains more than {max} files")]
    TooManyFiles {
        /// Maximum allowed
        max: usize,
    },
}

impl IntoResponse for FileUploadError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::FileTooLarge { .. } | Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MissingFile | Self::TooManyFiles { .. } | Self::MultipartError(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        tracing::warn!(status = status.as_u16(), error = %self, "Upload rejected");

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Extractor for the files of one upload request
///
/// Non-file fields, fields with another name and empty file inputs are
/// skipped. Zero remaining files is a `400`.
#[derive(Debug)]
pub struct MultiFileUpload(pub Vec<UploadedFile>);

impl<S> FromRequest<S> for MultiFileUpload
where
    S: Send + Sync,
    UploadSettings: FromRef<S>,
{
    type Rejection = FileUploadError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let limits = UploadSettings::from_ref(state);
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| FileUploadError::MultipartError(e.body_text()))?;

        let mut files = Vec::new();
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                FileUploadError::PayloadTooLarge
            } else {
                FileUploadError::MultipartError(e.body_text())
            }
        })? {
            if field.name() != Some(FILES_FIELD) {
                continue;
            }
            let Some(filename) = field.file_name().map(str::to_owned) else {
                continue;
            };
            if filename.is_empty() {
                continue;
            }

            if files.len() >= limits.max_files {
                return Err(FileUploadError::TooManyFiles {
                    max: limits.max_files,
                });
            }

            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = read_field_data(field, &filename, limits.max_file_size).await?;

            files.push(UploadedFile::new(filename, content_type, data));
        }

        if files.is_empty() {
            return Err(FileUploadError::MissingFile);
        }

        Ok(Self(files))
    }
}

/// Reads field data chunk by chunk, stopping as soon as `max_size` is passed
async fn read_field_data(
    mut field: Field<'_>,
    name: &str,
    max_size: usize,
) -> Result<Vec<u8>, FileUploadError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            FileUploadError::PayloadTooLarge
        } else {
            FileUploadError::MultipartError(e.body_text())
        }
    })? {
        if data.len() + chunk.len() > max_size {
            return Err(FileUploadError::FileTooLarge {
                name: name.to_string(),
                max: max_size,
            });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
