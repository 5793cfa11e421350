//! Drive credential store
//!
//! Holds the refresh token, a cached access token and the in-flight consent
//! requests. Access tokens are refreshed lazily on first use after expiry.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::google::GoogleDriveOAuth;
use super::types::{OAuthError, OAuthToken};
use crate::config::DriveSettings;

/// Access tokens are treated as expired this long before Google says so
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Consent requests older than this are rejected on callback
const PENDING_TTL: Duration = Duration::from_secs(600);

/// Upper bound on in-flight consent requests; the oldest is evicted beyond it
const MAX_PENDING: usize = 32;

#[derive(Debug, Default)]
struct TokenState {
    refresh_token: Option<String>,
    access_token: Option<CachedAccessToken>,
}

#[derive(Debug, Clone)]
struct CachedAccessToken {
    secret: String,
    expires_at: Option<Instant>,
}

impl CachedAccessToken {
    fn is_usable(&self) -> bool {
        self.expires_at
            .is_none_or(|expires| Instant::now() + EXPIRY_MARGIN < expires)
    }
}

#[derive(Debug)]
struct PendingAuthorization {
    pkce_verifier: String,
    created_at: Instant,
}

/// OAuth2 credentials for the Drive backend
///
/// A configured `refresh_token` makes the backend usable immediately. Without
/// one, an operator completes the consent flow once through `/auth/google`
/// and the granted refresh token is kept in memory.
pub struct DriveCredentials {
    oauth: GoogleDriveOAuth,
    tokens: RwLock<TokenState>,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
}

impl DriveCredentials {
    /// Creates the credential store from Drive settings
    ///
    /// # Errors
    ///
    /// Returns error if the OAuth2 client cannot be built
    pub fn new(settings: &DriveSettings) -> Result<Self, OAuthError> {
        let refresh_token = settings
            .refresh_token
            .clone()
            .filter(|token| !token.trim().is_empty());

        Ok(Self {
            oauth: GoogleDriveOAuth::new(settings)?,
            tokens: RwLock::new(TokenState {
                refresh_token,
                access_token: None,
            }),
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Whether a refresh token is available
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.tokens.read().refresh_token.is_some()
    }

    /// Returns a valid access token, refreshing it when needed
    ///
    /// # Errors
    ///
    /// - `OAuthError::NotAuthorized` when no refresh token is available
    /// - `OAuthError::TokenRejected` when Google refuses the refresh token
    pub async fn access_token(&self) -> Result<String, OAuthError> {
        let refresh_token = {
            let state = self.tokens.read();
            if let Some(cached) = state.access_token.as_ref().filter(|t| t.is_usable()) {
                return Ok(cached.secret.clone());
            }
            state.refresh_token.clone().ok_or(OAuthError::NotAuthorized)?
        };

        tracing::debug!("Refreshing Drive access token");
        let token = match self.oauth.refresh(&refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                if matches!(e, OAuthError::TokenRejected(_)) {
                    tracing::warn!(error = %e, "Drive refresh token rejected");
                    self.tokens.write().access_token = None;
                }
                return Err(e);
            }
        };

        Ok(self.store(token))
    }

    /// Starts a consent request and returns the URL to send the operator to
    #[must_use]
    pub fn begin_authorization(&self) -> String {
        let (auth_url, csrf_state, pkce_verifier) = self.oauth.authorization_url();

        let mut pending = self.pending.lock();
        pending.retain(|_, p| p.created_at.elapsed() < PENDING_TTL);
        while pending.len() >= MAX_PENDING {
            let Some(oldest) = pending
                .iter()
                .min_by_key(|(_, p)| p.created_at)
                .map(|(state, _)| state.clone())
            else {
                break;
            };
            pending.remove(&oldest);
        }
        pending.insert(
            csrf_state,
            PendingAuthorization {
                pkce_verifier,
                created_at: Instant::now(),
            },
        );

        auth_url
    }

    /// Completes a consent request from the OAuth2 callback
    ///
    /// The state token is single use.
    ///
    /// # Errors
    ///
    /// - `OAuthError::InvalidState` for unknown or expired state tokens
    /// - any token exchange failure
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<(), OAuthError> {
        let pending = self
            .pending
            .lock()
            .remove(state)
            .filter(|p| p.created_at.elapsed() < PENDING_TTL)
            .ok_or(OAuthError::InvalidState)?;

        let token = self.oauth.exchange_code(code, &pending.pkce_verifier).await?;
        if token.refresh_token.is_none() && !self.is_configured() {
            return Err(OAuthError::TokenExchangeFailed(
                "Google did not return a refresh token".to_string(),
            ));
        }

        self.store(token);
        tracing::info!("Google Drive authorized");
        Ok(())
    }

    fn store(&self, token: OAuthToken) -> String {
        let mut state = self.tokens.write();
        if let Some(refresh_token) = token.refresh_token {
            state.refresh_token = Some(refresh_token);
        }
        state.access_token = Some(CachedAccessToken {
            secret: token.access_token.clone(),
            expires_at: token.expires_at,
        });
        token.access_token
    }
}

impl std::fmt::Debug for DriveCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveCredentials")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}
