//! Client error types.

use salt_netapi_core::{CoreError, IdError};
use thiserror::Error;

/// A result type using `NetapiError`.
pub type Result<T> = std::result::Result<T, NetapiError>;

/// Errors that can occur while talking to the master.
#[derive(Debug, Error)]
pub enum NetapiError {
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The master answered with a status outside 200-299.
    #[error("request failed with HTTP {status}: {body}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response did not have the shape expected for the endpoint.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Logout was requested without a session token.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The master rejected the login credentials.
    #[error("authentication failed with HTTP {status}")]
    AuthenticationFailed {
        /// HTTP status code returned by the login endpoint.
        status: u16,
    },

    /// The requested minion is not known to the master.
    #[error("minion not found: {0}")]
    MinionNotFound(String),

    /// The requested job is not known to the master.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The master holds no key for the requested minion.
    #[error("minion key not found: {0}")]
    KeyNotFound(String),

    /// The master did not return both halves of a generated key pair.
    ///
    /// This is the normal outcome when the master already has an accepted key
    /// for the minion and regeneration was not forced.
    #[error("public or private key was not received for {0}")]
    KeyPairNotReceived(String),

    /// The key archive contained something other than the two key files.
    #[error("cannot extract key pair from archive entry {entry}: {reason}")]
    ArchiveCorrupt {
        /// Name of the offending entry (empty if the archive itself is unreadable).
        entry: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An endpoint that returns a fixed number of results returned another count.
    #[error("expected {expected} result(s) but received {actual}")]
    UnexpectedResultCount {
        /// Number of results the endpoint contractually returns.
        expected: usize,
        /// Number of results received.
        actual: usize,
    },

    /// A webhook was delivered but the master reported it as unsuccessful.
    #[error("hook rejected with status {status}: {message}")]
    HookRejected {
        /// Status reported in the hook response body.
        status: i64,
        /// Message reported in the hook response body.
        message: String,
    },

    /// An identifier could not be used in a request path.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// The client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl NetapiError {
    /// Returns `true` for failures of the request itself (connection errors
    /// and non-2xx statuses), as opposed to failures decoding a response.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RequestFailed { .. })
    }

    /// Returns `true` if the error reports a missing minion, job or key.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MinionNotFound(_) | Self::JobNotFound(_) | Self::KeyNotFound(_)
        )
    }

    /// The HTTP status behind this error, if the master answered at all.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } | Self::AuthenticationFailed { status } => {
                Some(*status)
            }
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn malformed(context: &str, e: impl std::fmt::Display) -> Self {
        Self::MalformedResponse(format!("{context}: {e}"))
    }
}

impl From<CoreError> for NetapiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidId(id) => Self::InvalidId(id),
            other @ CoreError::InvalidTarget { .. } => Self::MalformedResponse(other.to_string()),
        }
    }
}
