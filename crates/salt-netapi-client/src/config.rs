//! Client configuration.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{NetapiError, Result};

/// Configuration for connecting to a Salt master's `rest_cherrypy` API.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., `https://salt-master:8000`).
    pub address: String,

    /// Username passed to the external authentication backend.
    pub username: String,

    /// Password passed to the external authentication backend.
    pub password: String,

    /// External authentication backend name (e.g., `pam`, `file`, `ldap`).
    #[serde(default = "ClientConfig::default_backend")]
    pub backend: String,

    /// Skip TLS certificate verification. Masters commonly run with self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Per-request timeout in seconds. No timeout is applied when unset.
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

impl ClientConfig {
    fn default_backend() -> String {
        "pam".to_string()
    }

    /// Create a configuration with default backend and TLS settings.
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            backend: Self::default_backend(),
            accept_invalid_certs: false,
            request_timeout_seconds: None,
        }
    }

    /// Set the external authentication backend.
    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Load configuration from `SALT_API_*` environment variables.
    ///
    /// `SALT_API_URL`, `SALT_API_USER` and `SALT_API_PASSWORD` are required;
    /// `SALT_API_EAUTH`, `SALT_API_INSECURE` and `SALT_API_TIMEOUT` are optional.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::Config`] if a required variable is missing or an
    /// optional one cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| NetapiError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required("SALT_API_URL")?,
            required("SALT_API_USER")?,
            required("SALT_API_PASSWORD")?,
        );

        if let Some(backend) = lookup("SALT_API_EAUTH") {
            config.backend = backend;
        }
        if let Some(insecure) = lookup("SALT_API_INSECURE") {
            config.accept_invalid_certs = matches!(
                insecure.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        if let Some(timeout) = lookup("SALT_API_TIMEOUT") {
            let secs = timeout.parse().map_err(|_| {
                NetapiError::Config(format!("SALT_API_TIMEOUT is not a number: {timeout}"))
            })?;
            config.request_timeout_seconds = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the address is an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::Config`] describing the problem.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.address)
            .map_err(|e| NetapiError::Config(format!("invalid address {}: {e}", self.address)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(NetapiError::Config(format!(
                "unsupported scheme {other} in {}",
                self.address
            ))),
        }
    }

    /// The request timeout as a `Duration`, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("backend", &self.backend)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn new_uses_defaults() {
        let config = ClientConfig::new("https://master:8000", "salt", "secret");
        assert_eq!(config.backend, "pam");
        assert!(!config.accept_invalid_certs);
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let config = ClientConfig::new("https://master:8000", "salt", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn from_lookup_reads_all_settings() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SALT_API_URL", "https://master:8000"),
            ("SALT_API_USER", "salt"),
            ("SALT_API_PASSWORD", "secret"),
            ("SALT_API_EAUTH", "file"),
            ("SALT_API_INSECURE", "true"),
            ("SALT_API_TIMEOUT", "15"),
        ]))
        .unwrap();

        assert_eq!(config.address, "https://master:8000");
        assert_eq!(config.backend, "file");
        assert!(config.accept_invalid_certs);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn from_lookup_requires_credentials() {
        let result = ClientConfig::from_lookup(lookup(&[("SALT_API_URL", "https://m:8000")]));
        assert!(matches!(result, Err(NetapiError::Config(msg)) if msg.contains("SALT_API_USER")));
    }

    #[test]
    fn from_lookup_rejects_bad_timeout() {
        let result = ClientConfig::from_lookup(lookup(&[
            ("SALT_API_URL", "https://master:8000"),
            ("SALT_API_USER", "salt"),
            ("SALT_API_PASSWORD", "secret"),
            ("SALT_API_TIMEOUT", "soon"),
        ]));
        assert!(matches!(result, Err(NetapiError::Config(_))));
    }

    #[test]
    fn validate_rejects_non_http_address() {
        assert!(ClientConfig::new("ftp://master", "u", "p").validate().is_err());
        assert!(ClientConfig::new("master:8000/x y", "u", "p").validate().is_err());
        assert!(ClientConfig::new("http://master:8000", "u", "p").validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"address": "https://master:8000", "username": "salt", "password": "secret"}"#,
        )
        .unwrap();
        assert_eq!(config.backend, "pam");
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.request_timeout_seconds, None);
    }
}
