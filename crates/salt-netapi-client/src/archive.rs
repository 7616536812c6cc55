//! Extraction of generated key pairs from the tar stream returned by
//! `POST keys`.

use std::io::{Cursor, Read};

use serde::Serialize;
use tar::EntryType;

use crate::error::{NetapiError, Result};

/// Archive entry holding the public key.
pub const PUBLIC_KEY_ENTRY: &str = "minion.pub";
/// Archive entry holding the private key.
pub const PRIVATE_KEY_ENTRY: &str = "minion.pem";

/// A freshly generated, master-accepted key pair for a minion.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct MinionKeyPair {
    /// Minion id the pair was generated for.
    pub id: String,
    /// PEM-encoded public key.
    pub public: String,
    /// PEM-encoded private key.
    pub private: String,
}

impl std::fmt::Debug for MinionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinionKeyPair")
            .field("id", &self.id)
            .field("public", &self.public)
            .field("private", &"<redacted>")
            .finish()
    }
}

fn corrupt(entry: impl Into<String>, reason: impl std::fmt::Display) -> NetapiError {
    NetapiError::ArchiveCorrupt {
        entry: entry.into(),
        reason: reason.to_string(),
    }
}

/// Decode the key pair for minion `id` from a tar archive.
///
/// # Errors
///
/// Returns [`NetapiError::ArchiveCorrupt`] for unreadable archives, entries
/// that are not regular files, or entries other than the two key files, and
/// [`NetapiError::KeyPairNotReceived`] if either key is missing or empty.
pub fn decode_key_pair(id: &str, bytes: &[u8]) -> Result<MinionKeyPair> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let mut public = String::new();
    let mut private = String::new();

    for entry in archive.entries().map_err(|e| corrupt("", e))? {
        let mut entry = entry.map_err(|e| corrupt("", e))?;
        let name = entry
            .path()
            .map_err(|e| corrupt("", e))?
            .to_string_lossy()
            .into_owned();

        if entry.header().entry_type() != EntryType::Regular {
            return Err(corrupt(name, "unexpected file type"));
        }

        let slot = match name.as_str() {
            PUBLIC_KEY_ENTRY => &mut public,
            PRIVATE_KEY_ENTRY => &mut private,
            _ => return Err(corrupt(name.as_str(), "unknown file name")),
        };

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| corrupt(name.as_str(), format!("error reading contents: {e}")))?;
        *slot = content;
    }

    if public.is_empty() || private.is_empty() {
        return Err(NetapiError::KeyPairNotReceived(id.to_string()));
    }

    Ok(MinionKeyPair {
        id: id.to_string(),
        public,
        private,
    })
}
