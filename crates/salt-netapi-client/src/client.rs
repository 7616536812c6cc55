//! The [`SaltClient`] handle.
//!
//! Operations are implemented per endpoint family in sibling modules
//! (`auth`, `minions`, `jobs`, `keys`, `run`, `hook`, `stats`).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::session::Session;
use crate::transport::{HttpTransport, Transport};

/// Client for a Salt master's `rest_cherrypy` API.
///
/// Cloning is cheap; clones share one session and therefore one token.
/// Read operations may run concurrently once logged in. Each issues a single
/// request with no retry; wrap calls in `tokio::time::timeout` to bound them.
#[derive(Debug, Clone)]
pub struct SaltClient {
    session: Arc<Session>,
}

impl SaltClient {
    /// Create a client using the `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a caller-supplied transport.
    #[must_use]
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            session: Arc::new(Session::new(config, transport)),
        }
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current session token, if logged in.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.session.token()
    }

    /// Returns `true` if a token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.token().is_some()
    }

    /// When the current token expires, as reported by the master at login.
    #[must_use]
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.session.token_expiry()
    }
}
