//! Webhook events: `POST hook/{tag}`.

use reqwest::Method;
use salt_netapi_core::IdError;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{NetapiError, Result};
use crate::SaltClient;

#[derive(Debug, Deserialize)]
struct HookResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    message: String,
}

/// Normalize an event tag into the path below `hook/`.
///
/// Tags may span several segments (`deploy/web`), each of which must be
/// non-empty and free of whitespace or query delimiters.
fn hook_path(tag: &str) -> Result<String> {
    let tag = tag.trim_matches('/');
    if tag.is_empty() || tag.split('/').any(str::is_empty) {
        return Err(IdError::Empty.into());
    }
    if let Some(c) = tag
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '?' | '#' | '\\'))
    {
        return Err(IdError::InvalidCharacter(c).into());
    }
    Ok(format!("hook/{tag}"))
}

impl SaltClient {
    /// Fire an event on the master's event bus through the hook endpoint.
    ///
    /// `body` is forwarded as the event data; `None` sends no body.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::InvalidId`] for an unusable tag and
    /// [`NetapiError::HookRejected`] if the master reports `success: false`.
    pub async fn hook(&self, tag: &str, body: Option<&Value>) -> Result<()> {
        let endpoint = hook_path(tag)?;

        tracing::debug!(endpoint = %endpoint, has_body = body.is_some(), "Sending hook request");
        let response: HookResponse = self.session().send(Method::POST, &endpoint, body).await?;

        if !response.success {
            tracing::warn!(status = response.status, message = %response.message, "Hook rejected");
            return Err(NetapiError::HookRejected {
                status: response.status,
                message: response.message,
            });
        }
        Ok(())
    }
}
