//! Router assembly and server startup
//!
//! The storage backend is chosen once here from configuration. Each branch
//! builds the generic API router for its concrete backend and adds the
//! backend-specific routes (static file serving for local storage, the
//! consent flow for Drive).

use axum::{extract::DefaultBodyLimit, response::Redirect, routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

use crate::config::{BackendKind, FileKeepConfig};
use crate::handlers::api_routes;
use crate::middleware::serve_active_file;
use crate::oauth2::{self, DriveCredentials};
use crate::state::AppState;
use crate::storage::{CloudinaryFileStorage, DriveFileStorage, LocalFileStorage};

/// Multipart framing allowance on top of the file bytes
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Builds the complete application router
///
/// # Errors
///
/// Returns error if the selected backend is misconfigured or its local
/// directories cannot be created.
pub fn build_app(config: FileKeepConfig) -> anyhow::Result<Router> {
    let config = Arc::new(config);

    let router = match config.storage.backend {
        BackendKind::Local => {
            let settings = &config.storage.local;
            let storage = Arc::new(LocalFileStorage::new(
                &settings.active_dir,
                &settings.archive_dir,
                settings.public_prefix.clone(),
            )?);
            let files_route = format!("{}/{{name}}", settings.public_prefix.trim_end_matches('/'));

            let static_files = Router::new()
                .route(&files_route, get(serve_active_file))
                .with_state(Arc::clone(&storage));
            api_routes()
                .with_state(AppState::from_shared(storage, Arc::clone(&config)))
                .merge(static_files)
        }
        BackendKind::Drive => {
            let settings = &config.storage.drive;
            let credentials = Arc::new(DriveCredentials::new(settings)?);
            if !credentials.is_configured() {
                tracing::warn!("No Drive refresh token configured; authorize via /auth/google");
            }
            let storage = DriveFileStorage::new(settings, Arc::clone(&credentials))?;

            api_routes()
                .with_state(AppState::from_shared(Arc::new(storage), Arc::clone(&config)))
                .merge(oauth2::handlers::routes(credentials))
        }
        BackendKind::Cloudinary => {
            let storage = CloudinaryFileStorage::new(&config.storage.cloudinary)?;
            api_routes().with_state(AppState::from_shared(Arc::new(storage), Arc::clone(&config)))
        }
    };

    tracing::info!(backend = ?config.storage.backend, "Storage backend ready");
    Ok(with_common_layers(router, &config))
}

/// Adds static front-end directories, the root redirect and request layers
fn with_common_layers(mut router: Router, config: &FileKeepConfig) -> Router {
    for dir in &config.server.static_dirs {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            continue;
        }
        router = router.nest_service(
            &format!("/{dir}"),
            ServeDir::new(config.server.static_root.join(dir)),
        );
    }

    let login_page = config.server.login_page.clone();
    let body_limit = config
        .upload
        .max_file_size
        .saturating_mul(config.upload.max_files)
        .saturating_add(MULTIPART_OVERHEAD);

    router
        .route("/", get(move || std::future::ready(Redirect::to(&login_page))))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until `shutdown` resolves
///
/// # Errors
///
/// Returns error if the app cannot be built or the address cannot be bound
pub async fn serve<F>(config: FileKeepConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = config.bind_address();
    let app = build_app(config)?;

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::local_config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_redirects_to_login_page() {
        let temp = TempDir::new().unwrap();
        let app = build_app(local_config(temp.path())).unwrap();

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/HTML/login.html");
    }

    #[tokio::test]
    async fn test_static_directories_are_served() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("CSS")).unwrap();
        std::fs::write(temp.path().join("CSS/site.css"), "body{}").unwrap();
        let app = build_app(local_config(temp.path())).unwrap();

        let response = app
            .oneshot(Request::get("/CSS/site.css").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_misconfigured_remote_backend_fails_fast() {
        let temp = TempDir::new().unwrap();
        let mut config = local_config(temp.path());
        config.storage.backend = BackendKind::Cloudinary;

        let err = build_app(config).unwrap_err();
        assert!(err.to_string().contains("storage.cloudinary.cloud_name"));
    }

    #[tokio::test]
    async fn test_drive_backend_exposes_consent_routes() {
        let temp = TempDir::new().unwrap();
        let mut config = local_config(temp.path());
        config.storage.backend = BackendKind::Drive;
        config.storage.drive.client_id = "client".to_string();
        config.storage.drive.client_secret = "secret".to_string();
        config.storage.drive.active_folder_id = "active".to_string();
        config.storage.drive.archive_folder_id = "archive".to_string();
        let app = build_app(config).unwrap();

        let consent = app
            .clone()
            .oneshot(Request::get("/auth/google").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(consent.status().is_redirection());

        let files = app
            .oneshot(Request::get("/api/files").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(files.status(), StatusCode::UNAUTHORIZED);
    }
}
