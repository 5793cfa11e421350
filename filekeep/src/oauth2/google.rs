//! Google OAuth2 client for Drive access
//!
//! Wraps the `oauth2` crate with Google's endpoints and the Drive scope. The
//! consent URL asks for offline access so Google issues a refresh token.

use oauth2::{
    basic::{BasicClient, BasicErrorResponse, BasicTokenResponse},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use std::time::{Duration, Instant};

use super::types::{ConfiguredClient, OAuthError, OAuthToken};
use crate::config::DriveSettings;

/// Full Drive scope: upload, list and move within the configured folders
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Google OAuth2 client configured for Drive
pub struct GoogleDriveOAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
}

impl GoogleDriveOAuth {
    /// Create a new Google OAuth2 client from Drive settings
    ///
    /// # Errors
    ///
    /// Returns error if any configured URL is invalid
    pub fn new(settings: &DriveSettings) -> Result<Self, OAuthError> {
        let client = BasicClient::new(ClientId::new(settings.client_id.clone()))
            .set_client_secret(ClientSecret::new(settings.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(settings.auth_url.clone())
                    .map_err(|e| OAuthError::Generic(format!("Invalid auth URL: {e}")))?,
            )
            .set_token_uri(
                TokenUrl::new(settings.token_url.clone())
                    .map_err(|e| OAuthError::Generic(format!("Invalid token URL: {e}")))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(settings.redirect_uri.clone())
                    .map_err(|e| OAuthError::Generic(format!("Invalid redirect URI: {e}")))?,
            );

        // Redirects are never followed on the token endpoint
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::Generic(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            http_client,
        })
    }

    /// Generate authorization URL and CSRF state
    ///
    /// Returns tuple of (`authorization_url`, `csrf_state`, `pkce_verifier`)
    #[must_use]
    pub fn authorization_url(&self) -> (String, String, String) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        (
            auth_url.to_string(),
            csrf_state.secret().clone(),
            pkce_verifier.secret().clone(),
        )
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// Returns error if the token exchange fails
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<OAuthToken, OAuthError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(classify)?;

        Ok(to_token(&response))
    }

    /// Obtain a fresh access token from a refresh token
    ///
    /// # Errors
    ///
    /// - `OAuthError::TokenRejected` when Google refuses the refresh token
    /// - `OAuthError::TokenExchangeFailed` on transport failures
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthToken, OAuthError> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http_client)
            .await
            .map_err(classify)?;

        Ok(to_token(&response))
    }
}

fn to_token(response: &BasicTokenResponse) -> OAuthToken {
    OAuthToken {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_at: response
            .expires_in()
            .map(|duration| Instant::now() + Duration::from_secs(duration.as_secs())),
    }
}

fn classify<RE>(error: RequestTokenError<RE, BasicErrorResponse>) -> OAuthError
where
    RE: std::error::Error + 'static,
{
    match error {
        RequestTokenError::ServerResponse(response) => {
            OAuthError::TokenRejected(response.to_string())
        }
        other => OAuthError::TokenExchangeFailed(other.to_string()),
    }
}
