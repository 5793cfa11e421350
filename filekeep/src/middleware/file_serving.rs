//! Static serving of active local files with range and cache support
//!
//! Only the local backend serves bytes itself; remote backends hand out
//! provider URLs. Files are addressed by their stored name under
//! `/RECURSOS/{name}`. Reserved assets are served like any other file.

use crate::storage::{LocalFileStorage, StorageError};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        header::{
            ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
            IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED, RANGE,
        },
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{sync::Arc, time::SystemTime, time::UNIX_EPOCH};
use thiserror::Error;

/// `Cache-Control` sent with every file
const CACHE_POLICY: &str = "public, max-age=3600";

/// Serves one active file
///
/// # Errors
///
/// - `404` when the file does not exist in the active directory
/// - `416` for unsatisfiable ranges (including any range on an empty file)
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use filekeep::middleware::serve_active_file;
/// use filekeep::storage::LocalFileStorage;
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let storage = Arc::new(LocalFileStorage::new("./RECURSOS", "./RESPALDO", "/RECURSOS")?);
///
/// let app: Router = Router::new()
///     .route("/RECURSOS/{name}", get(serve_active_file))
///     .with_state(storage);
/// # Ok(())
/// # }
/// ```
pub async fn serve_active_file(
    State(storage): State<Arc<LocalFileStorage>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, FileServingError> {
    let file = storage.read_active(&name).await?;

    let modified_secs = file
        .modified
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let etag = format!(r#""{}-{}-{modified_secs}""#, file.name.len(), file.data.len());
    let content_type = mime_guess::from_path(&file.name)
        .first_or_octet_stream()
        .to_string();
    let meta = ResponseMeta {
        etag: &etag,
        content_type: &content_type,
        modified: file.modified,
    };

    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if if_none_match.to_str().is_ok_and(|v| v == etag) {
            return Ok((StatusCode::NOT_MODIFIED, ()).into_response());
        }
    }

    if let Some(range_header) = headers.get(RANGE) {
        return serve_range_request(file.data, range_header, &meta, &headers);
    }

    Ok(build_file_response(file.data, &meta, None))
}

struct ResponseMeta<'a> {
    etag: &'a str,
    content_type: &'a str,
    modified: SystemTime,
}

/// Serve a single-range request (partial content)
fn serve_range_request(
    data: Vec<u8>,
    range_header: &HeaderValue,
    meta: &ResponseMeta<'_>,
    headers: &HeaderMap,
) -> Result<Response, FileServingError> {
    // A stale If-Range validator gets the full file
    if let Some(if_range) = headers.get(IF_RANGE) {
        if if_range.to_str().map_or(true, |v| v != meta.etag) {
            return Ok(build_file_response(data, meta, None));
        }
    }

    let (start, end) = parse_range(range_header, data.len())?;
    let file_size = data.len();
    let content_range = format!("bytes {start}-{end}/{file_size}");
    let range_data = data[start..=end].to_vec();

    Ok(build_file_response(range_data, meta, Some(&content_range)))
}

/// Parses `bytes=start-end`, `bytes=start-` or `bytes=-suffix` into an
/// inclusive range within `file_size`
fn parse_range(header: &HeaderValue, file_size: usize) -> Result<(usize, usize), FileServingError> {
    let spec = header
        .to_str()
        .ok()
        .and_then(|s| s.strip_prefix("bytes="))
        .ok_or(FileServingError::InvalidRange)?;
    let (start_str, end_str) = spec.split_once('-').ok_or(FileServingError::InvalidRange)?;

    if file_size == 0 {
        return Err(FileServingError::RangeNotSatisfiable(file_size));
    }
    let last = file_size - 1;

    let (start, end) = if start_str.is_empty() {
        let suffix: usize = end_str.parse().map_err(|_| FileServingError::InvalidRange)?;
        if suffix == 0 {
            return Err(FileServingError::RangeNotSatisfiable(file_size));
        }
        (file_size.saturating_sub(suffix), last)
    } else {
        let start: usize = start_str.parse().map_err(|_| FileServingError::InvalidRange)?;
        let end = if end_str.is_empty() {
            last
        } else {
            end_str
                .parse::<usize>()
                .map_err(|_| FileServingError::InvalidRange)?
                .min(last)
        };
        (start, end)
    };

    if start > end || start >= file_size {
        return Err(FileServingError::RangeNotSatisfiable(file_size));
    }
    Ok((start, end))
}

/// Build a file response with content and cache headers
fn build_file_response(
    data: Vec<u8>,
    meta: &ResponseMeta<'_>,
    content_range: Option<&str>,
) -> Response {
    let status = if content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, meta.content_type)
        .header(CONTENT_LENGTH, data.len())
        .header(ETAG, meta.etag)
        .header(ACCEPT_RANGES, "bytes")
        .header(CACHE_CONTROL, CACHE_POLICY)
        .header(LAST_MODIFIED, httpdate::fmt_http_date(meta.modified));
    if let Some(content_range) = content_range {
        response = response.header(CONTENT_RANGE, content_range);
    }

    response
        .body(Body::from(data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Error types for file serving
#[derive(Debug, Error)]
pub enum FileServingError {
    /// Storage backend error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Malformed `Range` header
    #[error("Invalid range request")]
    InvalidRange,

    /// Range outside the file
    #[error("Range not satisfiable (file size: {0})")]
    RangeNotSatisfiable(usize),
}

impl IntoResponse for FileServingError {
    fn into_response(self) -> Response {
        match self {
            Self::Storage(StorageError::NotFound(name)) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("File not found: {name}") })),
            )
                .into_response(),
            Self::Storage(e) => {
                tracing::error!(error = %e, "Failed to read file");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
            Self::InvalidRange => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            Self::RangeNotSatisfiable(size) => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(CONTENT_RANGE, format!("bytes */{size}"))],
                self.to_string(),
            )
                .into_response(),
        }
    }
}
