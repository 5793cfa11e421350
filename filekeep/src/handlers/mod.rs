//! HTTP handlers for the file API

pub mod files;

pub use files::{
    api_routes, health, list_files, move_by_body, move_by_path, upload, FailedUpload,
    HealthResponse, ListResponse, MoveRequest, MovedByBodyResponse, MovedResponse,
    UploadResponse,
};
