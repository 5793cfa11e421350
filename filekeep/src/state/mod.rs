//! Application state shared by request handlers

use crate::config::FileKeepConfig;
use crate::storage::FileStorage;
use std::sync::Arc;

/// Application state for the file API
///
/// Generic over the storage backend selected at startup, so handlers never
/// inspect which backend is in use.
///
/// # Example
///
/// ```rust,no_run
/// use filekeep::{config::FileKeepConfig, state::AppState, storage::LocalFileStorage};
///
/// # fn example() -> anyhow::Result<()> {
/// let config = FileKeepConfig::default();
/// let storage = LocalFileStorage::new("./RECURSOS", "./RESPALDO", "/RECURSOS")?;
/// let state = AppState::new(storage, config);
/// assert_eq!(state.config().server.port, 3000);
/// # Ok(())
/// # }
/// ```
pub struct AppState<S> {
    storage: Arc<S>,
    config: Arc<FileKeepConfig>,
}

impl<S: FileStorage> AppState<S> {
    /// Create application state from a backend and the loaded configuration
    pub fn new(storage: S, config: FileKeepConfig) -> Self {
        Self::from_shared(Arc::new(storage), Arc::new(config))
    }

    /// Create application state from already shared parts
    #[must_use]
    pub fn from_shared(storage: Arc<S>, config: Arc<FileKeepConfig>) -> Self {
        Self { storage, config }
    }

    /// Storage backend
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Loaded configuration
    #[must_use]
    pub fn config(&self) -> &FileKeepConfig {
        &self.config
    }
}

// Manual impl: `S` itself need not be `Clone`
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: Arc::clone(&self.config),
        }
    }
}
