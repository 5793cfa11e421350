//! HTTP middleware and file-serving handlers

pub mod file_serving;

pub use file_serving::{serve_active_file, FileServingError};
