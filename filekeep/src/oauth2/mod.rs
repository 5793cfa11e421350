//! Google OAuth2 for the Drive backend
//!
//! The Drive backend acts on behalf of one Google account. Its refresh token
//! comes from configuration or from a one-time consent flow:
//!
//! 1. `GET /auth/google` redirects to Google's consent screen
//! 2. Google redirects back to `GET /oauth2callback?code&state`
//! 3. The code is exchanged and the refresh token is kept in memory

pub mod credentials;
pub mod google;
pub mod handlers;
pub mod types;

pub use credentials::DriveCredentials;
pub use google::GoogleDriveOAuth;
pub use types::{OAuthError, OAuthToken};
