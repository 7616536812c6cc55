//! Login and logout.
//!
//! The session moves between two states: unauthenticated (no token) and
//! authenticated (token held). Nothing re-authenticates implicitly; a request
//! made with an expired token fails with the master's 401 like any other
//! failed request, and the caller must call [`SaltClient::login`] again.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NetapiError, Result};
use crate::session::{SessionToken, NO_BODY};
use crate::SaltClient;

/// Session details reported by the master at login.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginInfo {
    /// Authenticated user.
    pub user: String,
    /// External authentication backend that accepted the credentials.
    pub backend: String,
    /// When the session started.
    pub start: Option<DateTime<Utc>>,
    /// When the token expires.
    pub expire: Option<DateTime<Utc>>,
    /// Permissions granted by the master's `external_auth` configuration.
    pub permissions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    #[serde(rename = "return", default)]
    items: Vec<RawLogin>,
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, deserialize_with = "crate::time::unix_seconds")]
    start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::time::unix_seconds")]
    expire: Option<DateTime<Utc>>,
    #[serde(default)]
    user: String,
    #[serde(default, rename = "eauth")]
    backend: String,
    #[serde(default)]
    perms: Vec<Value>,
}

impl SaltClient {
    /// Authenticate with the configured credentials and store the token.
    ///
    /// Calling this while already authenticated replaces the token.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::AuthenticationFailed`] if the master answers
    /// with a non-2xx status, [`NetapiError::MalformedResponse`] if the
    /// response carries no token, or [`NetapiError::Transport`] if the master
    /// cannot be reached.
    pub async fn login(&self) -> Result<LoginInfo> {
        let session = self.session();
        let _guard = session.transition_lock().lock().await;

        tracing::debug!(
            user = %session.credentials().username,
            backend = %session.credentials().backend,
            "Sending authentication request"
        );

        let envelope: LoginEnvelope = match session
            .send(Method::POST, "login", Some(session.credentials()))
            .await
        {
            Ok(envelope) => envelope,
            Err(NetapiError::RequestFailed { status, .. }) => {
                tracing::warn!(status, "Authentication rejected by master");
                return Err(NetapiError::AuthenticationFailed { status });
            }
            Err(e) => return Err(e),
        };

        let raw = envelope.items.into_iter().next().ok_or_else(|| {
            NetapiError::MalformedResponse("login response contained no items".to_string())
        })?;
        let token = raw
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NetapiError::MalformedResponse("login response has no token".to_string()))?;

        session.set_token(SessionToken {
            value: token,
            expires_at: raw.expire,
        });
        tracing::debug!(user = %raw.user, expire = ?raw.expire, "Authenticated");

        Ok(LoginInfo {
            user: raw.user,
            backend: raw.backend,
            start: raw.start,
            expire: raw.expire,
            permissions: raw.perms,
        })
    }

    /// End the session on the master and clear the token.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::NotAuthenticated`] without contacting the master
    /// if no token is held. Transport failures leave the token in place.
    pub async fn logout(&self) -> Result<()> {
        let session = self.session();
        let _guard = session.transition_lock().lock().await;

        if session.token().is_none() {
            return Err(NetapiError::NotAuthenticated);
        }

        tracing::debug!("Sending logout request");
        // The acknowledgement body carries nothing we need.
        session.send_raw(Method::POST, "logout", NO_BODY).await?;

        session.clear_token();
        Ok(())
    }
}
