//! OAuth2 types shared by the Google client and the credential store

use oauth2::{basic::BasicClient, EndpointNotSet, EndpointSet};
use std::time::Instant;
use thiserror::Error;

/// OAuth2 client with auth and token endpoints configured
pub type ConfiguredClient = BasicClient<
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Tokens returned by Google
#[derive(Debug, Clone)]
pub struct OAuthToken {
    /// Bearer token for Drive API calls
    pub access_token: String,

    /// Refresh token (only on the first consent with offline access)
    pub refresh_token: Option<String>,

    /// When the access token stops being valid
    pub expires_at: Option<Instant>,
}

/// OAuth2 errors
#[derive(Debug, Error)]
pub enum OAuthError {
    /// No credential has been configured or granted yet
    #[error("Google Drive is not authorized")]
    NotAuthorized,

    /// Invalid or expired state token on the callback
    #[error("Invalid or expired OAuth2 state token")]
    InvalidState,

    /// Google rejected the grant (revoked or invalid token, bad code)
    #[error("Token rejected: {0}")]
    TokenRejected(String),

    /// The token request could not be completed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Generic OAuth2 error
    #[error("OAuth2 error: {0}")]
    Generic(String),
}
