//! Configuration management for filekeep
//!
//! Configuration is built once at process start and passed into the storage
//! backend and router. Sources, highest priority first:
//!
//! 1. Environment variables (`FILEKEEP_` prefix, `__` for nesting)
//! 2. The file given with `--config`, or `./filekeep.toml`
//! 3. Hardcoded defaults
//!
//! Environment variable format: `FILEKEEP_SECTION__FIELD_NAME`
//! - Example: `FILEKEEP_STORAGE__BACKEND=cloudinary`
//! - Example: `FILEKEEP_STORAGE__CLOUDINARY__API_SECRET=...`
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! port = 3000
//!
//! [storage]
//! backend = "local"
//!
//! [storage.local]
//! active_dir = "./RECURSOS"
//! archive_dir = "./RESPALDO"
//!
//! [storage.drive]
//! client_id = "..."
//! client_secret = "..."
//! active_folder_id = "1AbC..."
//! archive_folder_id = "1XyZ..."
//! ```

use crate::storage::{StorageError, StorageResult};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "./filekeep.toml";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Directory containing the static asset folders
    pub static_root: PathBuf,

    /// Static asset folders served verbatim under `/<name>`
    pub static_dirs: Vec<String>,

    /// Where `/` redirects to
    pub login_page: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_root: PathBuf::from("."),
            static_dirs: vec!["CSS".to_string(), "JS".to_string(), "HTML".to_string()],
            login_page: "/HTML/login.html".to_string(),
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Maximum size of a single file in bytes
    pub max_file_size: usize,

    /// Maximum number of files in one request
    pub max_files: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024,
            max_files: 20,
        }
    }
}

/// Which storage backend a deployment uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local filesystem
    #[default]
    Local,
    /// Google Drive
    Drive,
    /// Cloudinary
    Cloudinary,
}

/// Local filesystem backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Directory of active files
    pub active_dir: PathBuf,

    /// Directory of archived files
    pub archive_dir: PathBuf,

    /// URL path the active directory is served under
    pub public_prefix: String,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            active_dir: PathBuf::from("./RECURSOS"),
            archive_dir: PathBuf::from("./RESPALDO"),
            public_prefix: "/RECURSOS".to_string(),
        }
    }
}

/// Google Drive backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// OAuth2 redirect URI registered with Google
    pub redirect_uri: String,

    /// Long-lived refresh token, if one was already granted
    pub refresh_token: Option<String>,

    /// Folder id holding active files
    pub active_folder_id: String,

    /// Folder id holding archived files
    pub archive_folder_id: String,

    /// Authorization endpoint
    pub auth_url: String,

    /// Token endpoint
    pub token_url: String,

    /// Drive metadata API base
    pub api_base: String,

    /// Drive upload API base
    pub upload_base: String,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:3000/oauth2callback".to_string(),
            refresh_token: None,
            active_folder_id: String::new(),
            archive_folder_id: String::new(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://www.googleapis.com".to_string(),
            upload_base: "https://www.googleapis.com/upload".to_string(),
        }
    }
}

impl DriveSettings {
    /// Checks that every required field is present
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Misconfigured` naming the missing fields
    pub fn validate(&self) -> StorageResult<()> {
        require(&[
            ("storage.drive.client_id", &self.client_id),
            ("storage.drive.client_secret", &self.client_secret),
            ("storage.drive.redirect_uri", &self.redirect_uri),
            ("storage.drive.active_folder_id", &self.active_folder_id),
            ("storage.drive.archive_folder_id", &self.archive_folder_id),
        ])
    }
}

/// Hash used for Cloudinary request signatures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    /// SHA-1, the Cloudinary account default
    #[default]
    Sha1,
    /// SHA-256, for accounts configured for it
    Sha256,
}

/// Cloudinary backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinarySettings {
    /// Cloud name
    pub cloud_name: String,

    /// API key
    pub api_key: String,

    /// API secret
    pub api_secret: String,

    /// Folder holding active files
    pub active_folder: String,

    /// Folder holding archived files
    pub archive_folder: String,

    /// API base URL
    pub api_base: String,

    /// Request signature hash
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for CloudinarySettings {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            active_folder: "RECURSOS".to_string(),
            archive_folder: "RESPALDO".to_string(),
            api_base: "https://api.cloudinary.com".to_string(),
            signature_algorithm: SignatureAlgorithm::Sha1,
        }
    }
}

impl CloudinarySettings {
    /// Checks that every required field is present
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Misconfigured` naming the missing fields
    pub fn validate(&self) -> StorageResult<()> {
        require(&[
            ("storage.cloudinary.cloud_name", &self.cloud_name),
            ("storage.cloudinary.api_key", &self.api_key),
            ("storage.cloudinary.api_secret", &self.api_secret),
            ("storage.cloudinary.active_folder", &self.active_folder),
            ("storage.cloudinary.archive_folder", &self.archive_folder),
        ])?;
        if self.active_folder == self.archive_folder {
            return Err(StorageError::Misconfigured(
                "storage.cloudinary active and archive folders must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage backend selection and per-backend settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend used by this deployment
    pub backend: BackendKind,

    /// Local filesystem settings
    pub local: LocalSettings,

    /// Google Drive settings
    pub drive: DriveSettings,

    /// Cloudinary settings
    pub cloudinary: CloudinarySettings,
}

/// Complete filekeep configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileKeepConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Upload limits
    #[serde(default)]
    pub upload: UploadSettings,

    /// Storage backend settings
    #[serde(default)]
    pub storage: StorageSettings,
}

impl FileKeepConfig {
    /// Loads configuration from defaults, a TOML file and the environment
    ///
    /// `path` defaults to [`DEFAULT_CONFIG_FILE`]. A missing file is not an
    /// error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the file exists but is not valid TOML
    /// - a value has the wrong type (for example a non-numeric port)
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use filekeep::config::FileKeepConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = FileKeepConfig::load(None)?;
    /// println!("listening on {}", config.server.port);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let config = Figment::new()
            // Defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            // File, if present
            .merge(Toml::file(path))
            // Environment variables override everything
            .merge(Env::prefixed("FILEKEEP_").split("__").lowercase(true))
            .extract()?;

        Ok(config)
    }

    /// Address string for binding the listener
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn require(fields: &[(&str, &String)]) -> StorageResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StorageError::Misconfigured(format!(
            "missing required settings: {}",
            missing.join(", ")
        )))
    }
}
