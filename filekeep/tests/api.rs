//! End-to-end tests for the file API over the local backend
//!
//! Each test builds the full application from configuration and drives it
//! through `axum-test`.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use filekeep::config::FileKeepConfig;
use filekeep::server::build_app;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

fn config_in(dir: &Path) -> FileKeepConfig {
    let mut config = FileKeepConfig::default();
    config.server.static_root = dir.to_path_buf();
    config.storage.local.active_dir = dir.join("RECURSOS");
    config.storage.local.archive_dir = dir.join("RESPALDO");
    config
}

fn test_server(config: FileKeepConfig) -> TestServer {
    TestServer::new(build_app(config).unwrap()).unwrap()
}

fn file_part(name: &str, content: &'static str) -> Part {
    Part::bytes(content.as_bytes())
        .file_name(name.to_string())
        .mime_type("application/octet-stream")
}

async fn upload(server: &TestServer, files: &[(&str, &'static str)]) -> Value {
    let form = files
        .iter()
        .fold(MultipartForm::new(), |form, &(name, content)| {
            form.add_part("files", file_part(name, content))
        });

    let response = server.post("/api/upload").multipart(form).await;
    response.assert_status_ok();
    response.json::<Value>()
}

async fn listed_ids(server: &TestServer) -> Vec<String> {
    let response = server.get("/api/files").await;
    response.assert_status_ok();
    response.json::<Value>()["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_upload_list_archive_round_trip() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));

    let uploaded = upload(&server, &[("report.pdf", "%PDF-1.4 fake")]).await;
    assert_eq!(uploaded["ok"], true);
    let saved = &uploaded["saved"][0];
    let id = saved["id"].as_str().unwrap().to_string();
    assert!(id.ends_with("_report.pdf"));
    assert_eq!(saved["name"], "report.pdf");
    assert_eq!(saved["location"], "active");

    assert_eq!(listed_ids(&server).await, vec![id.clone()]);

    let moved = server.post(&format!("/api/move-to-respaldo/{id}")).await;
    moved.assert_status_ok();
    let moved = moved.json::<Value>();
    assert_eq!(moved["ok"], true);
    assert_eq!(moved["movedTo"], id.as_str());

    assert!(listed_ids(&server).await.is_empty());
    let archived = std::fs::read(temp.path().join("RESPALDO").join(&id)).unwrap();
    assert_eq!(archived, b"%PDF-1.4 fake");
}

#[tokio::test]
async fn test_same_name_in_one_batch_gets_distinct_ids() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));

    let uploaded = upload(&server, &[("a.txt", "first"), ("a.txt", "second")]).await;
    let saved = uploaded["saved"].as_array().unwrap();
    assert_eq!(saved.len(), 2);
    assert_ne!(saved[0]["id"], saved[1]["id"]);
    assert_eq!(saved[0]["name"], "a.txt");
    assert_eq!(saved[1]["name"], "a.txt");

    assert_eq!(listed_ids(&server).await.len(), 2);
}

#[tokio::test]
async fn test_empty_listing() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));

    let response = server.get("/api/files").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "files": [] }));
}

#[tokio::test]
async fn test_archiving_unknown_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));

    let response = server.post("/api/move-to-respaldo/ghost.txt").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_archiving_by_json_body() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));
    let uploaded = upload(&server, &[("notes.md", "# notes")]).await;
    let id = uploaded["saved"][0]["id"].as_str().unwrap().to_string();

    let response = server
        .post("/api/move-to-respaldo")
        .json(&json!({ "public_id": id }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["moved_to"], id.as_str());

    let missing = server
        .post("/api/move-to-respaldo")
        .json(&json!({}))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_without_files_is_rejected() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));

    let form = MultipartForm::new().add_text("comment", "no files here");
    let response = server.post("/api/upload").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
    assert!(listed_ids(&server).await.is_empty());
}

#[tokio::test]
async fn test_oversized_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut config = config_in(temp.path());
    config.upload.max_file_size = 8;
    let server = test_server(config);

    let form = MultipartForm::new().add_part("files", file_part("big.bin", "0123456789abcdef"));
    let response = server.post("/api/upload").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert!(listed_ids(&server).await.is_empty());
}

#[tokio::test]
async fn test_reserved_assets_are_hidden_but_served() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));
    std::fs::write(temp.path().join("RECURSOS/logo_empresa.png"), b"png").unwrap();
    upload(&server, &[("visible.txt", "hi")]).await;

    let ids = listed_ids(&server).await;
    assert_eq!(ids.len(), 1);
    assert!(ids[0].ends_with("_visible.txt"));

    let logo = server.get("/RECURSOS/logo_empresa.png").await;
    logo.assert_status_ok();
    assert_eq!(&logo.as_bytes()[..], b"png");

    let archive = server.post("/api/move-to-respaldo/logo_empresa.png").await;
    archive.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_uploaded_file_is_served_at_its_url() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));
    let uploaded = upload(&server, &[("hello.txt", "Hello, world")]).await;
    let url = uploaded["saved"][0]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/RECURSOS/"));

    let response = server.get(&url).await;
    response.assert_status_ok();
    response.assert_text("Hello, world");
    assert_eq!(response.header("content-type"), "text/plain");

    let id = uploaded["saved"][0]["id"].as_str().unwrap().to_string();
    server.post(&format!("/api/move-to-respaldo/{id}")).await.assert_status_ok();
    server.get(&url).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_archive_collision_keeps_earlier_copy() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));
    std::fs::write(temp.path().join("RECURSOS/notes.txt"), b"new").unwrap();
    std::fs::write(temp.path().join("RESPALDO/notes.txt"), b"old").unwrap();

    let response = server.post("/api/move-to-respaldo/notes.txt").await;
    response.assert_status_ok();
    let moved_to = response.json::<Value>()["movedTo"]
        .as_str()
        .unwrap()
        .to_string();

    assert_ne!(moved_to, "notes.txt");
    assert!(moved_to.starts_with("notes_respaldo_"));
    let archive = temp.path().join("RESPALDO");
    assert_eq!(std::fs::read(archive.join("notes.txt")).unwrap(), b"old");
    assert_eq!(std::fs::read(archive.join(&moved_to)).unwrap(), b"new");
}

#[tokio::test]
async fn test_health_reports_backend() {
    let temp = TempDir::new().unwrap();
    let server = test_server(config_in(temp.path()));

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok", "backend": "local" }));
}
