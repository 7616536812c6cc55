//! Key management: `GET keys`, `GET keys/{id}` and `POST keys`.

use std::collections::{BTreeMap, BTreeSet};

use reqwest::Method;
use salt_netapi_core::MinionId;
use serde::{Deserialize, Serialize};

use crate::archive::{decode_key_pair, MinionKeyPair};
use crate::error::{NetapiError, Result};
use crate::session::{Credentials, NO_BODY};
use crate::SaltClient;

/// Keys known to the master, grouped by state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyResult {
    /// The master's own key files.
    #[serde(default)]
    pub local: BTreeSet<String>,
    /// Accepted minion keys.
    #[serde(rename = "minions", default)]
    pub accepted: BTreeSet<String>,
    /// Keys awaiting acceptance.
    #[serde(rename = "minions_pre", default)]
    pub pending: BTreeSet<String>,
    /// Rejected minion keys.
    #[serde(rename = "minions_rejected", default)]
    pub rejected: BTreeSet<String>,
    /// Denied minion keys.
    #[serde(rename = "minions_denied", default)]
    pub denied: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct KeyListEnvelope {
    #[serde(rename = "return")]
    keys: KeyResult,
}

#[derive(Debug, Deserialize)]
struct KeyDetailsEnvelope {
    /// Fingerprints by minion id, grouped by key state.
    #[serde(rename = "return", default)]
    states: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct KeyGenerateRequest<'a> {
    #[serde(rename = "mid")]
    id: &'a str,
    #[serde(rename = "keysize", skip_serializing_if = "Option::is_none")]
    key_size: Option<u32>,
    force: bool,
    #[serde(flatten)]
    credentials: &'a Credentials,
}

impl SaltClient {
    /// List the keys known to the master.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::MalformedResponse`] if the response has no key listing.
    pub async fn keys(&self) -> Result<KeyResult> {
        tracing::debug!("Sending key list request");
        let envelope: KeyListEnvelope = self.session().send(Method::GET, "keys", NO_BODY).await?;
        Ok(envelope.keys)
    }

    /// Return the fingerprint of a minion's key, whatever state it is in.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::KeyNotFound`] if the master holds no key for the minion.
    pub async fn key(&self, id: &MinionId) -> Result<String> {
        tracing::debug!(minion = %id, "Sending key details request");
        let envelope: KeyDetailsEnvelope = self
            .session()
            .send(Method::GET, &format!("keys/{id}"), NO_BODY)
            .await?;

        envelope
            .states
            .into_values()
            .find_map(|mut fingerprints| fingerprints.remove(id.as_str()))
            .ok_or_else(|| NetapiError::KeyNotFound(id.to_string()))
    }

    /// Generate and accept a key pair for a minion on the master.
    ///
    /// `key_size` defaults to the master's configured size when `None`.
    /// Without `force`, a master that already holds an accepted key for the
    /// minion returns no keys.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::KeyPairNotReceived`] if the master did not
    /// return both keys, and [`NetapiError::ArchiveCorrupt`] if the archive
    /// holds unexpected entries.
    pub async fn generate_key_pair(
        &self,
        id: &MinionId,
        key_size: Option<u32>,
        force: bool,
    ) -> Result<MinionKeyPair> {
        let session = self.session();
        let request = KeyGenerateRequest {
            id: id.as_str(),
            key_size,
            force,
            credentials: session.credentials(),
        };

        tracing::debug!(minion = %id, ?key_size, force, "Sending generate key request");
        let archive = session.send_raw(Method::POST, "keys", Some(&request)).await?;
        decode_key_pair(id.as_str(), &archive)
    }
}
