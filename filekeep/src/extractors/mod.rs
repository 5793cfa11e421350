//! Request extractors

pub mod file_upload;

pub use file_upload::{FileUploadError, MultiFileUpload, FILES_FIELD};
