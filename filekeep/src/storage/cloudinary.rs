//! Cloudinary storage implementation
//!
//! Files live under two folder prefixes of one Cloudinary cloud. Uploads and
//! renames are signed with the API secret; listing and lookups use the Admin
//! API with basic auth.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::http::ensure_success;
use super::sanitize::{
    archive_collision_name, display_name, is_reserved, split_extension, storage_key,
    unique_token,
};
use super::traits::FileStorage;
use super::types::{MovedFile, StorageError, StorageResult, StoredFile, UploadedFile};
use crate::config::{CloudinarySettings, SignatureAlgorithm};

/// Admin API page size limit
const MAX_RESULTS: &str = "500";

/// Cloudinary keeps images, videos and everything else in separate namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    Image,
    Video,
    Raw,
}

impl ResourceKind {
    const ALL: [Self; 3] = [Self::Image, Self::Video, Self::Raw];

    /// Namespace an upload lands in, judged by extension and then by the
    /// declared content type
    fn for_upload(file: &UploadedFile) -> Self {
        let mime = file
            .extension()
            .and_then(|ext| mime_guess::from_ext(ext).first())
            .map(|m| m.type_().as_str().to_string())
            .unwrap_or_else(|| {
                file.content_type
                    .split('/')
                    .next()
                    .unwrap_or_default()
                    .to_ascii_lowercase()
            });

        match mime.as_str() {
            "image" => Self::Image,
            // Cloudinary files audio under video
            "video" | "audio" => Self::Video,
            _ => Self::Raw,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Raw => "raw",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Resource {
    public_id: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Signs request parameters the way Cloudinary verifies them
///
/// Parameters are sorted by name, joined as `k=v` with `&`, suffixed with the
/// API secret and hashed. `file`, `api_key`, `resource_type` and `cloud_name`
/// are never signed and must not be passed in.
///
/// # Examples
///
/// ```rust
/// use filekeep::config::SignatureAlgorithm;
/// use filekeep::storage::cloudinary::sign_params;
///
/// let signature = sign_params(
///     &[("timestamp", "1315060510".to_string()), ("public_id", "sample_image".to_string())],
///     "abcd",
///     SignatureAlgorithm::Sha1,
/// );
/// assert_eq!(signature.len(), 40);
/// ```
#[must_use]
pub fn sign_params(params: &[(&str, String)], secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut payload = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    payload.push_str(secret);

    match algorithm {
        SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
        SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
    }
}

/// Cloudinary storage backend
///
/// `id` is the Cloudinary public id, e.g. `RECURSOS/1718000000000_report`.
#[derive(Debug)]
pub struct CloudinaryFileStorage {
    client: reqwest::Client,
    settings: CloudinarySettings,
}

impl CloudinaryFileStorage {
    /// Creates a Cloudinary backend
    ///
    /// # Errors
    ///
    /// - `StorageError::Misconfigured` when required settings are missing
    /// - `StorageError::Http` when the HTTP client cannot be built
    pub fn new(settings: &CloudinarySettings) -> StorageResult<Self> {
        settings.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("filekeep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut settings = settings.clone();
        settings.api_base = settings.api_base.trim_end_matches('/').to_string();
        settings.active_folder = settings.active_folder.trim_matches('/').to_string();
        settings.archive_folder = settings.archive_folder.trim_matches('/').to_string();

        Ok(Self { client, settings })
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/v1_1/{}/{tail}",
            self.settings.api_base, self.settings.cloud_name
        )
    }

    fn resource_url(&self, kind: ResourceKind, public_id: &str) -> String {
        let encoded = public_id
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        self.url(&format!("resources/{}/upload/{encoded}", kind.as_str()))
    }

    /// Appends `timestamp`, `api_key` and `signature` to `params`
    fn signed(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("timestamp", Utc::now().timestamp().to_string()));
        let signature = sign_params(
            &params,
            &self.settings.api_secret,
            self.settings.signature_algorithm,
        );
        params.push(("api_key", self.settings.api_key.clone()));
        params.push(("signature", signature));
        params
    }

    /// Base name of an id directly inside the active folder
    fn active_base<'a>(&self, public_id: &'a str) -> Option<&'a str> {
        public_id
            .strip_prefix(self.settings.active_folder.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|base| !base.is_empty() && !base.contains('/'))
    }

    fn to_stored(&self, resource: Resource) -> Option<StoredFile> {
        let base = self.active_base(&resource.public_id)?;
        if is_reserved(base) {
            return None;
        }

        let mut name = display_name(base).to_string();
        if let Some(format) = resource.format.as_deref().filter(|f| !f.is_empty()) {
            if split_extension(&name).1.is_empty() {
                name = format!("{name}.{format}");
            }
        }
        let content_type = mime_guess::from_path(&name).first().map(|m| m.to_string());
        let access_url = resource.secure_url.or(resource.url).unwrap_or_default();

        Some(
            StoredFile::active(resource.public_id.clone(), name, access_url)
                .with_created_at(resource.created_at)
                .with_content_type(content_type)
                .with_size(resource.bytes),
        )
    }

    async fn list_kind(&self, kind: ResourceKind) -> StorageResult<Vec<Resource>> {
        let prefix = format!("{}/", self.settings.active_folder);
        let mut resources = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.url(&format!("resources/{}/upload", kind.as_str())))
                .basic_auth(&self.settings.api_key, Some(&self.settings.api_secret))
                .query(&[("prefix", prefix.as_str()), ("max_results", MAX_RESULTS)]);
            if let Some(next) = &cursor {
                request = request.query(&[("next_cursor", next.as_str())]);
            }

            let page: ResourceList = ensure_success(request.send().await?).await?.json().await?;
            resources.extend(page.resources);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(resources)
    }

    /// Whether `public_id` exists as a resource of `kind`
    async fn exists(&self, kind: ResourceKind, public_id: &str) -> StorageResult<bool> {
        let resp = self
            .client
            .get(self.resource_url(kind, public_id))
            .basic_auth(&self.settings.api_key, Some(&self.settings.api_secret))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(resp).await?;
        Ok(true)
    }

    async fn find_kind(&self, public_id: &str) -> StorageResult<Option<ResourceKind>> {
        for kind in ResourceKind::ALL {
            if self.exists(kind, public_id).await? {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl FileStorage for CloudinaryFileStorage {
    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }

    async fn put(&self, file: UploadedFile) -> StorageResult<StoredFile> {
        let kind = ResourceKind::for_upload(&file);
        let key = storage_key(&file.filename, unique_token());
        // Images and videos get their extension back from `format`; raw
        // files only keep it inside the public id
        let base = match kind {
            ResourceKind::Raw => key.as_str(),
            ResourceKind::Image | ResourceKind::Video => split_extension(&key).0,
        };
        let public_id = format!("{}/{base}", self.settings.active_folder);

        let params = self.signed(vec![
            ("overwrite", "false".to_string()),
            ("public_id", public_id),
        ]);

        let mut part = Part::bytes(file.data).file_name(key.clone());
        if !file.content_type.is_empty() {
            part = part.mime_str(&file.content_type)?;
        }
        let form = params
            .into_iter()
            .fold(Form::new(), |form, (k, v)| form.text(k, v))
            .part("file", part);

        let resp = self
            .client
            .post(self.url(&format!("{}/upload", kind.as_str())))
            .multipart(form)
            .send()
            .await?;
        let created: Resource = ensure_success(resp).await?.json().await?;

        tracing::info!(public_id = %created.public_id, kind = kind.as_str(), "Uploaded file to Cloudinary");
        self.to_stored(created)
            .ok_or_else(|| StorageError::Other("Upload landed outside the active folder".to_string()))
    }

    async fn list(&self) -> StorageResult<Vec<StoredFile>> {
        let mut files = Vec::new();
        for kind in ResourceKind::ALL {
            files.extend(
                self.list_kind(kind)
                    .await?
                    .into_iter()
                    .filter_map(|r| self.to_stored(r)),
            );
        }

        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(files)
    }

    async fn move_to_archive(&self, id: &str) -> StorageResult<MovedFile> {
        let base = self
            .active_base(id)
            .filter(|base| !is_reserved(base))
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let kind = self
            .find_kind(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let archive = &self.settings.archive_folder;
        let mut target = format!("{archive}/{base}");
        while self.exists(kind, &target).await? {
            target = format!("{archive}/{}", archive_collision_name(base, unique_token()));
        }

        let params = self.signed(vec![
            ("from_public_id", id.to_string()),
            ("overwrite", "false".to_string()),
            ("to_public_id", target),
        ]);
        let resp = self
            .client
            .post(self.url(&format!("{}/rename", kind.as_str())))
            .form(&params)
            .send()
            .await?;
        let moved: Resource = ensure_success(resp).await?.json().await?;

        tracing::info!(from = %id, to = %moved.public_id, "Archived Cloudinary resource");
        Ok(MovedFile {
            id: moved.public_id.clone(),
            name: moved.public_id,
        })
    }

    fn resolve_url(&self, file: &StoredFile) -> String {
        file.access_url.clone()
    }
}
