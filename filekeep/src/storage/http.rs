//! Response handling shared by the remote backends

use super::types::{StorageError, StorageResult};
use reqwest::{Response, StatusCode};

/// Longest provider message carried into an error
const MAX_MESSAGE_LEN: usize = 300;

/// Passes successful responses through and turns the rest into errors
///
/// `401` becomes `StorageError::Unauthorized`; any other non-success status
/// becomes `StorageError::Provider` with the (truncated) response body.
pub(crate) async fn ensure_success(resp: Response) -> StorageResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = provider_message(&body);

    if status == StatusCode::UNAUTHORIZED {
        return Err(StorageError::Unauthorized(message));
    }
    Err(StorageError::Provider {
        status: status.as_u16(),
        message,
    })
}

/// Pulls a readable message out of a provider error body
///
/// Both Google (`{"error": {"message"}}`) and Cloudinary
/// (`{"error": {"message"}}` or `{"error": "..."}`) are understood; anything
/// else is returned as truncated text.
fn provider_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        let error = json.get("error")?;
        error
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| error.as_str())
            .map(str::to_owned)
    });

    let mut message = message.unwrap_or_else(|| body.trim().to_string());
    if message.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}
