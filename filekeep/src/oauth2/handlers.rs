//! Drive consent flow handlers

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::credentials::DriveCredentials;
use crate::error::ApiError;

/// OAuth2 callback query parameters
#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    /// Authorization code from Google
    pub code: Option<String>,
    /// CSRF state token
    pub state: Option<String>,
    /// Error reported by Google (e.g. `access_denied`)
    pub error: Option<String>,
}

/// Routes for the Drive consent flow
///
/// The router carries its own state so it can be merged into an application
/// router of any state type.
pub fn routes(credentials: Arc<DriveCredentials>) -> Router {
    Router::new()
        .route("/auth/google", get(begin))
        .route("/oauth2callback", get(callback))
        .with_state(credentials)
}

/// Redirects the operator to Google's consent screen
pub async fn begin(State(credentials): State<Arc<DriveCredentials>>) -> Redirect {
    Redirect::to(&credentials.begin_authorization())
}

/// Exchanges the authorization code and stores the granted tokens
///
/// # Errors
///
/// - `400` when Google reported an error, the code is missing or the state
///   token is unknown
/// - `401`/`500` when the token exchange fails
pub async fn callback(
    State(credentials): State<Arc<DriveCredentials>>,
    Query(params): Query<OAuthCallback>,
) -> Result<Redirect, ApiError> {
    if let Some(error) = params.error {
        return Err(ApiError::BadRequest(format!("Authorization denied: {error}")));
    }
    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Err(ApiError::BadRequest(
            "Missing code or state parameter".to_string(),
        ));
    };

    credentials.complete_authorization(&code, &state).await?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveSettings;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    fn credentials() -> Arc<DriveCredentials> {
        let settings = DriveSettings {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            ..DriveSettings::default()
        };
        Arc::new(DriveCredentials::new(&settings).unwrap())
    }

    #[tokio::test]
    async fn test_begin_redirects_to_google() {
        let response = routes(credentials())
            .oneshot(Request::get("/auth/google").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://accounts.google.com"));
    }

    #[tokio::test]
    async fn test_callback_without_code_is_bad_request() {
        let response = routes(credentials())
            .oneshot(
                Request::get("/oauth2callback?state=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_with_forged_state_is_bad_request() {
        let response = routes(credentials())
            .oneshot(
                Request::get("/oauth2callback?code=c&state=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_with_provider_error() {
        let response = routes(credentials())
            .oneshot(
                Request::get("/oauth2callback?error=access_denied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
