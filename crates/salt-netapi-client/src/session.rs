//! Session state and request signing.
//!
//! A [`Session`] owns the master address, the external-auth credentials and
//! the current token. Every outbound request is built here so that the token
//! header is attached consistently.
//!
//! Token reads never hold the lock across an `.await`. Login and logout are
//! serialized through [`Session::transition_lock`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{NetapiError, Result};
use crate::transport::{OutboundRequest, Transport};

/// Placeholder for requests that carry no body.
pub(crate) const NO_BODY: Option<&()> = None;

/// External authentication credentials, sent at login and with commands that
/// authenticate per request (`run`, key generation).
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
    /// External authentication backend name.
    #[serde(rename = "eauth")]
    pub backend: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("backend", &self.backend)
            .finish()
    }
}

/// The token held by an authenticated session.
#[derive(Clone)]
pub(crate) struct SessionToken {
    pub(crate) value: String,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

/// Connection state shared by all clones of a client.
pub struct Session {
    address: String,
    credentials: Credentials,
    token: RwLock<Option<SessionToken>>,
    transition_lock: tokio::sync::Mutex<()>,
    transport: Arc<dyn Transport>,
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            address: config.address.trim_end_matches('/').to_string(),
            credentials: Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
                backend: config.backend.clone(),
            },
            token: RwLock::new(None),
            transition_lock: tokio::sync::Mutex::new(()),
            transport,
        }
    }

    /// Base address of the API, without a trailing slash.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The credentials this session authenticates with.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The current token, if authenticated.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().as_ref().map(|t| t.value.clone())
    }

    /// When the current token expires, as reported at login.
    #[must_use]
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token.read().as_ref().and_then(|t| t.expires_at)
    }

    pub(crate) fn set_token(&self, token: SessionToken) {
        *self.token.write() = Some(token);
    }

    pub(crate) fn clear_token(&self) {
        *self.token.write() = None;
    }

    /// Lock serializing login/logout so token transitions never interleave.
    pub(crate) fn transition_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.transition_lock
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.address, endpoint)
    }

    /// Build a signed request for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::Encode`] if `body` cannot be serialized.
    pub fn build_request<B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<OutboundRequest>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(NetapiError::Encode)?;

        Ok(OutboundRequest {
            method,
            url: self.url(endpoint),
            token: self.token(),
            body,
        })
    }

    /// Send a request and return the response body verbatim.
    ///
    /// # Errors
    ///
    /// Returns any error reported by the transport.
    pub async fn send_raw<B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, endpoint, body)?;
        self.transport.execute(request).await
    }

    /// Send a request and decode the response envelope as `T`.
    ///
    /// An empty response body decodes as JSON `null`, so optional envelopes
    /// accept no-content answers.
    ///
    /// # Errors
    ///
    /// Returns any error reported by the transport, or
    /// [`NetapiError::MalformedResponse`] if the body does not decode as `T`.
    pub async fn send<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let bytes = self.send_raw(method, endpoint, body).await?;
        decode_envelope(endpoint, &bytes)
    }
}

pub(crate) fn decode_envelope<T: DeserializeOwned>(endpoint: &str, bytes: &[u8]) -> Result<T> {
    let decoded = if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_slice(bytes)
    };
    decoded.map_err(|e| NetapiError::malformed(endpoint, e))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("credentials", &self.credentials)
            .field("authenticated", &self.token.read().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::test_support::RecordingTransport;

    fn session() -> (Session, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let config = ClientConfig::new("https://master:8000/", "salt", "secret");
        (Session::new(&config, transport.clone()), transport)
    }

    #[test]
    fn trims_trailing_slash_from_address() {
        let (session, _) = session();
        assert_eq!(session.address(), "https://master:8000");
    }

    #[test]
    fn distinguishes_no_body_from_empty_object() {
        let (session, _) = session();
        let none = session.build_request(Method::POST, "logout", NO_BODY).unwrap();
        assert!(none.body.is_none());

        let empty = session
            .build_request(Method::POST, "hook/x", Some(&json!({})))
            .unwrap();
        assert_eq!(empty.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn attaches_token_once_set() {
        let (session, _) = session();
        let anonymous = session.build_request(Method::GET, "stats", NO_BODY).unwrap();
        assert!(anonymous.token.is_none());

        session.set_token(SessionToken {
            value: "tok".into(),
            expires_at: None,
        });
        let signed = session.build_request(Method::GET, "stats", NO_BODY).unwrap();
        assert_eq!(signed.token.as_deref(), Some("tok"));
        assert_eq!(signed.url, "https://master:8000/stats");

        session.clear_token();
        assert!(session.token().is_none());
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let value: Option<serde_json::Value> = decode_envelope("logout", b"").unwrap();
        assert!(value.is_none());

        #[derive(Debug, Deserialize)]
        struct Envelope {
            #[allow(dead_code)]
            r#return: Vec<serde_json::Value>,
        }
        let err = decode_envelope::<Envelope>("minions", b"  ").unwrap_err();
        assert!(matches!(err, NetapiError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn send_decodes_json_envelope() {
        let (session, transport) = session();
        transport.push_ok(br#"{"return": [1, 2]}"#);

        #[derive(Deserialize)]
        struct Envelope {
            r#return: Vec<u32>,
        }
        let env: Envelope = session.send(Method::GET, "stats", NO_BODY).await.unwrap();
        assert_eq!(env.r#return, vec![1, 2]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn debug_redacts_secrets() {
        let (session, _) = session();
        session.set_token(SessionToken {
            value: "tok-123".into(),
            expires_at: None,
        });
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("tok-123"));
    }
}
