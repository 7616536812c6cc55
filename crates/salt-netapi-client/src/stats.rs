//! Server statistics: `GET stats`.

use reqwest::Method;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::session::NO_BODY;
use crate::SaltClient;

impl SaltClient {
    /// Return the master's CherryPy server statistics, undecoded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NetapiError::MalformedResponse`] if the body is not a
    /// JSON object.
    pub async fn stats(&self) -> Result<Map<String, Value>> {
        tracing::debug!("Sending stats request");
        self.session().send(Method::GET, "stats", NO_BODY).await
    }
}
