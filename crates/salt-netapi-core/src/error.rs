//! Common error types for the Salt NetAPI client.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while building or decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// A target received from the master does not match its declared type.
    #[error("invalid target for type {target_type}: {reason}")]
    InvalidTarget {
        /// The wire type tag that accompanied the target.
        target_type: String,
        /// What was wrong with the wire value.
        reason: String,
    },
}
