//! Test helpers shared by unit tests
//!
//! - [`multipart_request`] builds an upload request by hand
//! - [`local_config`] points a configuration at a temporary directory

use axum::body::Body;
use axum::http::{header, Request};
use std::fmt::Write;
use std::path::Path;

use crate::config::FileKeepConfig;

const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

/// Builds a `POST /api/upload` multipart request
///
/// Each entry is `(field name, file name, contents)`.
#[must_use]
pub fn multipart_request(files: &[(&str, &str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, filename, content) in files {
        write!(
            &mut body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n"
        )
        .unwrap();
    }
    write!(&mut body, "--{BOUNDARY}--\r\n").unwrap();

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Default configuration with local storage rooted under `dir`
#[must_use]
pub fn local_config(dir: &Path) -> FileKeepConfig {
    let mut config = FileKeepConfig::default();
    config.server.static_root = dir.to_path_buf();
    config.storage.local.active_dir = dir.join("RECURSOS");
    config.storage.local.archive_dir = dir.join("RESPALDO");
    config
}
