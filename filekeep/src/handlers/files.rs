//! File API handlers
//!
//! Every handler is generic over the storage backend chosen at startup.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use filekeep::{config::FileKeepConfig, handlers, state::AppState, storage::LocalFileStorage};
//!
//! # fn example() -> anyhow::Result<()> {
//! let storage = LocalFileStorage::new("./RECURSOS", "./RESPALDO", "/RECURSOS")?;
//! let app: axum::Router = handlers::api_routes().with_state(AppState::new(storage, FileKeepConfig::default()));
//! # Ok(())
//! # }
//! ```

use axum::{
    body::Bytes,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::UploadSettings;
use crate::error::ApiError;
use crate::extractors::MultiFileUpload;
use crate::state::AppState;
use crate::storage::{FileStorage, StoredFile};

/// Response for a successful (or partially successful) upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always `true`
    pub ok: bool,
    /// Stored files, in upload order
    pub saved: Vec<StoredFile>,
    /// Files the backend rejected, in upload order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedUpload>,
}

/// A file the backend refused to store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedUpload {
    /// Client-supplied file name
    pub name: String,
    /// Backend error message
    pub error: String,
}

/// Response for the file listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    /// Active files, newest first
    pub files: Vec<StoredFile>,
}

/// Response for `POST /api/move-to-respaldo/{id}`
#[derive(Debug, Serialize, Deserialize)]
pub struct MovedResponse {
    /// Always `true`
    pub ok: bool,
    /// Final archive key
    #[serde(rename = "movedTo")]
    pub moved_to: String,
}

/// Response for `POST /api/move-to-respaldo` with a JSON body
#[derive(Debug, Serialize, Deserialize)]
pub struct MovedByBodyResponse {
    /// Always `true`
    pub ok: bool,
    /// Final archive key
    pub moved_to: String,
}

/// JSON body accepted by `POST /api/move-to-respaldo`
#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    /// Identifier of the file to archive
    #[serde(default)]
    pub public_id: Option<String>,
}

/// Response for `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: String,
    /// Active backend name
    pub backend: String,
}

impl<S: FileStorage> FromRef<AppState<S>> for UploadSettings {
    fn from_ref(state: &AppState<S>) -> Self {
        state.config().upload.clone()
    }
}

/// File API routes
///
/// - `POST /api/upload`
/// - `GET /api/files`
/// - `POST /api/move-to-respaldo/{id}`
/// - `POST /api/move-to-respaldo`
/// - `GET /health`
pub fn api_routes<S: FileStorage>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/upload", post(upload::<S>))
        .route("/api/files", get(list_files::<S>))
        .route("/api/move-to-respaldo/{id}", post(move_by_path::<S>))
        .route("/api/move-to-respaldo", post(move_by_body::<S>))
        .route("/health", get(health::<S>))
}

/// Stores every uploaded file, one at a time, in upload order
///
/// A batch where only some files fail still answers `200` and lists the
/// failures; a batch where every file fails answers `500`.
///
/// # Errors
///
/// - `400` when the request carries no files (from the extractor)
/// - `401` when the backend is not authorized
pub async fn upload<S: FileStorage>(
    State(state): State<AppState<S>>,
    MultiFileUpload(files): MultiFileUpload,
) -> Result<Response, ApiError> {
    let storage = state.storage();
    storage.ensure_authorized().await?;

    let mut saved = Vec::with_capacity(files.len());
    let mut failed = Vec::new();
    for file in files {
        let name = file.filename.clone();
        match storage.put(file).await {
            Ok(stored) => saved.push(stored),
            Err(e) => {
                tracing::error!(backend = storage.backend_name(), file = %name, error = %e, "Upload failed");
                failed.push(FailedUpload {
                    name,
                    error: e.to_string(),
                });
            }
        }
    }

    if saved.is_empty() {
        let body = serde_json::json!({
            "error": "No file could be stored",
            "failed": failed,
        });
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response());
    }

    tracing::info!(saved = saved.len(), failed = failed.len(), "Upload processed");
    Ok(Json(UploadResponse {
        ok: true,
        saved,
        failed,
    })
    .into_response())
}

/// Lists active files
///
/// # Errors
///
/// Returns `500` when the backend cannot be enumerated
pub async fn list_files<S: FileStorage>(
    State(state): State<AppState<S>>,
) -> Result<Json<ListResponse>, ApiError> {
    state.storage().ensure_authorized().await?;
    let files = state.storage().list().await?;
    Ok(Json(ListResponse { files }))
}

/// Archives the file named in the path
///
/// # Errors
///
/// - `404` when the file is not active
/// - `500` when the move fails
pub async fn move_by_path<S: FileStorage>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<MovedResponse>, ApiError> {
    let moved_to = archive(&state, &id).await?;
    Ok(Json(MovedResponse { ok: true, moved_to }))
}

/// Archives the file named by `public_id` in the JSON body
///
/// # Errors
///
/// - `400` when the body is not JSON or `public_id` is missing
/// - `404` when the file is not active
/// - `500` when the move fails
pub async fn move_by_body<S: FileStorage>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Result<Json<MovedByBodyResponse>, ApiError> {
    let request: MoveRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let id = request
        .public_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("public_id is required".to_string()))?;

    let moved_to = archive(&state, &id).await?;
    Ok(Json(MovedByBodyResponse { ok: true, moved_to }))
}

async fn archive<S: FileStorage>(state: &AppState<S>, id: &str) -> Result<String, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("File id is required".to_string()));
    }

    let storage = state.storage();
    storage.ensure_authorized().await?;
    let moved = storage.move_to_archive(id).await?;

    tracing::info!(backend = storage.backend_name(), id = %id, archived_as = %moved.name, "File archived");
    Ok(moved.name)
}

/// Liveness check naming the active backend
pub async fn health<S: FileStorage>(State(state): State<AppState<S>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.storage().backend_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileKeepConfig;
    use crate::storage::{MockFileStorage, MovedFile, StorageError};
    use crate::testing::multipart_request;
    use axum::body::Body;
    use axum::http::Request;
    use mockall::predicate::eq;
    use tower::ServiceExt;

    fn app(storage: MockFileStorage) -> Router {
        api_routes().with_state(AppState::new(storage, FileKeepConfig::default()))
    }

    fn authorized() -> MockFileStorage {
        let mut storage = MockFileStorage::new();
        storage.expect_ensure_authorized().returning(|| Ok(()));
        storage.expect_backend_name().return_const("mock");
        storage
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_reports_partial_failure() {
        let mut storage = authorized();
        storage.expect_put().returning(|file| {
            if file.filename == "bad.txt" {
                Err(StorageError::Other("disk full".into()))
            } else {
                Ok(StoredFile::active("1_good.txt", "good.txt", "/RECURSOS/1_good.txt"))
            }
        });

        let response = app(storage)
            .oneshot(multipart_request(&[
                ("files", "good.txt", "ok"),
                ("files", "bad.txt", "no"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["saved"][0]["name"], "good.txt");
        assert_eq!(json["failed"][0]["name"], "bad.txt");
    }

    #[tokio::test]
    async fn test_upload_all_failed_is_server_error() {
        let mut storage = authorized();
        storage
            .expect_put()
            .returning(|_| Err(StorageError::Other("down".into())));

        let response = app(storage)
            .oneshot(multipart_request(&[("files", "a.txt", "a")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert!(json["error"].is_string());
        assert_eq!(json["failed"][0]["name"], "a.txt");
    }

    #[tokio::test]
    async fn test_unauthorized_backend_is_401() {
        let mut storage = MockFileStorage::new();
        storage
            .expect_ensure_authorized()
            .returning(|| Err(StorageError::Unauthorized("visit /auth/google".into())));
        storage.expect_list().never();

        let response = app(storage)
            .oneshot(Request::get("/api/files").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_backend_failure_is_500() {
        let mut storage = authorized();
        storage.expect_list().returning(|| {
            Err(StorageError::Provider {
                status: 503,
                message: "unavailable".into(),
            })
        });

        let response = app(storage)
            .oneshot(Request::get("/api/files").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_move_by_path() {
        let mut storage = authorized();
        storage
            .expect_move_to_archive()
            .with(eq("5_a.txt"))
            .returning(|_| {
                Ok(MovedFile {
                    id: "5_a.txt".into(),
                    name: "5_a.txt".into(),
                })
            });

        let response = app(storage)
            .oneshot(Request::post("/api/move-to-respaldo/5_a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["movedTo"], "5_a.txt");
    }

    #[tokio::test]
    async fn test_move_by_body_uses_snake_case_key() {
        let mut storage = authorized();
        storage
            .expect_move_to_archive()
            .with(eq("RECURSOS/5_a"))
            .returning(|_| {
                Ok(MovedFile {
                    id: "RESPALDO/5_a".into(),
                    name: "RESPALDO/5_a".into(),
                })
            });

        let response = app(storage)
            .oneshot(post_json("/api/move-to-respaldo", r#"{"public_id":"RECURSOS/5_a"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["moved_to"], "RESPALDO/5_a");
    }

    #[tokio::test]
    async fn test_move_by_body_requires_public_id() {
        let mut storage = authorized();
        storage.expect_move_to_archive().never();
        let app = app(storage);

        for body in ["{}", r#"{"public_id":""}"#, "not json"] {
            let response = app.clone().oneshot(post_json("/api/move-to-respaldo", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[tokio::test]
    async fn test_move_unknown_is_404() {
        let mut storage = authorized();
        storage
            .expect_move_to_archive()
            .returning(|id| Err(StorageError::NotFound(id.to_string())));

        let response = app(storage)
            .oneshot(Request::post("/api/move-to-respaldo/ghost.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_health_names_backend() {
        let response = app(authorized())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["backend"], "mock");
    }
}
