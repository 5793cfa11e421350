//! Google Drive storage implementation
//!
//! Active and archived files live in two Drive folders. Archiving re-parents
//! the file in a single `PATCH`, so the Drive file id never changes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::http::ensure_success;
use super::sanitize::{archive_collision_name, display_name, is_reserved, storage_key, unique_token};
use super::traits::FileStorage;
use super::types::{MovedFile, StorageError, StorageResult, StoredFile, UploadedFile};
use crate::config::DriveSettings;
use crate::oauth2::{DriveCredentials, OAuthError};

/// Metadata fields requested for every file
const FILE_FIELDS: &str =
    "id,name,mimeType,webViewLink,webContentLink,createdTime,size,parents,trashed";

/// Largest page Drive accepts for `files.list`
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
    #[serde(default)]
    web_content_link: Option<String>,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
    // int64 values arrive as JSON strings
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    trashed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl From<OAuthError> for StorageError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::NotAuthorized | OAuthError::TokenRejected(_) => {
                Self::Unauthorized(err.to_string())
            }
            other => Self::Other(other.to_string()),
        }
    }
}

/// Google Drive storage backend
///
/// `id` is the Drive file id; file names on Drive carry the generated storage
/// key so listings show the same names as the local backend.
#[derive(Debug)]
pub struct DriveFileStorage {
    client: reqwest::Client,
    credentials: Arc<DriveCredentials>,
    active_folder_id: String,
    archive_folder_id: String,
    api_base: String,
    upload_base: String,
}

impl DriveFileStorage {
    /// Creates a Drive backend
    ///
    /// # Errors
    ///
    /// - `StorageError::Misconfigured` when required settings are missing
    /// - `StorageError::Http` when the HTTP client cannot be built
    pub fn new(settings: &DriveSettings, credentials: Arc<DriveCredentials>) -> StorageResult<Self> {
        settings.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("filekeep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            credentials,
            active_folder_id: settings.active_folder_id.clone(),
            archive_folder_id: settings.archive_folder_id.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            upload_base: settings.upload_base.trim_end_matches('/').to_string(),
        })
    }

    /// Credential store shared with the consent handlers
    #[must_use]
    pub const fn credentials(&self) -> &Arc<DriveCredentials> {
        &self.credentials
    }

    async fn token(&self) -> StorageResult<String> {
        Ok(self.credentials.access_token().await?)
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/{}", self.files_url(), urlencoding::encode(id))
    }

    fn to_stored(file: DriveFile) -> StoredFile {
        let access_url = file
            .web_view_link
            .or(file.web_content_link)
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));
        StoredFile::active(file.id, display_name(&file.name), access_url)
            .with_created_at(file.created_time)
            .with_content_type(file.mime_type)
            .with_size(file.size.and_then(|s| s.parse().ok()))
    }

    /// Whether a file named `name` already sits in the archive folder
    async fn archive_has(&self, token: &str, name: &str) -> StorageResult<bool> {
        let q = format!(
            "'{}' in parents and name = '{}' and trashed = false",
            quote(&self.archive_folder_id),
            quote(name)
        );
        let resp = self
            .client
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[("q", q.as_str()), ("fields", "files(id)"), ("pageSize", "1")])
            .send()
            .await?;
        let list: FileList = ensure_success(resp).await?.json().await?;
        Ok(!list.files.is_empty())
    }
}

#[async_trait]
impl FileStorage for DriveFileStorage {
    fn backend_name(&self) -> &'static str {
        "drive"
    }

    async fn ensure_authorized(&self) -> StorageResult<()> {
        if self.credentials.is_configured() {
            Ok(())
        } else {
            Err(StorageError::Unauthorized(
                "Google Drive is not authorized; visit /auth/google".to_string(),
            ))
        }
    }

    async fn put(&self, file: UploadedFile) -> StorageResult<StoredFile> {
        let token = self.token().await?;
        let key = storage_key(&file.filename, unique_token());
        let metadata = json!({ "name": key, "parents": [self.active_folder_id] });
        let content_type = if file.content_type.is_empty() {
            "application/octet-stream"
        } else {
            file.content_type.as_str()
        };

        let boundary = format!("filekeep-{}", Uuid::new_v4().simple());
        let body = related_body(&boundary, &metadata, content_type, &file.data);

        let resp = self
            .client
            .post(format!("{}/drive/v3/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let created: DriveFile = ensure_success(resp).await?.json().await?;

        tracing::info!(id = %created.id, name = %created.name, "Uploaded file to Drive");
        Ok(Self::to_stored(created))
    }

    async fn list(&self) -> StorageResult<Vec<StoredFile>> {
        let token = self.token().await?;
        let q = format!(
            "'{}' in parents and trashed = false",
            quote(&self.active_folder_id)
        );
        let fields = format!("nextPageToken, files({FILE_FIELDS})");

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(self.files_url()).bearer_auth(&token).query(&[
                ("q", q.as_str()),
                ("orderBy", "createdTime desc"),
                ("fields", fields.as_str()),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let page: FileList = ensure_success(request.send().await?).await?.json().await?;
            files.extend(
                page.files
                    .into_iter()
                    .filter(|f| !is_reserved(&f.name))
                    .map(Self::to_stored),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn move_to_archive(&self, id: &str) -> StorageResult<MovedFile> {
        if id.trim().is_empty() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let token = self.token().await?;

        let resp = self
            .client
            .get(self.file_url(id))
            .bearer_auth(&token)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let file: DriveFile = ensure_success(resp).await?.json().await?;

        if file.trashed
            || is_reserved(&file.name)
            || !file.parents.iter().any(|p| p == &self.active_folder_id)
        {
            return Err(StorageError::NotFound(id.to_string()));
        }

        let mut target = file.name.clone();
        while self.archive_has(&token, &target).await? {
            target = archive_collision_name(&file.name, unique_token());
        }

        let body = if target == file.name {
            json!({})
        } else {
            json!({ "name": target })
        };
        let resp = self
            .client
            .patch(self.file_url(id))
            .bearer_auth(&token)
            .query(&[
                ("addParents", self.archive_folder_id.as_str()),
                ("removeParents", self.active_folder_id.as_str()),
                ("fields", "id,name"),
            ])
            .json(&body)
            .send()
            .await?;
        let moved: DriveFile = ensure_success(resp).await?.json().await?;

        tracing::info!(id = %moved.id, name = %moved.name, "Archived Drive file");
        Ok(MovedFile {
            id: moved.id,
            name: moved.name,
        })
    }

    fn resolve_url(&self, file: &StoredFile) -> String {
        file.access_url.clone()
    }
}

/// Escapes a value for a single-quoted Drive query literal
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds a `multipart/related` body: JSON metadata then the media bytes
fn related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
