//! Core types for the Salt NetAPI client.
//!
//! This crate provides the foundational types shared by the client and CLI:
//!
//! - **Identifiers**: Validated IDs for minions and jobs, safe to embed in endpoint paths
//! - **Targeting**: The [`Target`] sum type and the closed [`TargetType`] enumeration
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use salt_netapi_core::{JobId, MinionId, Target, TargetType};
//!
//! let minion: MinionId = "minion1".parse().unwrap();
//! let job: JobId = "20200120025629463543".parse().unwrap();
//! assert!(job.timestamp().is_some());
//!
//! let target = Target::glob("web*");
//! assert_eq!(target.target_type(), TargetType::Glob);
//!
//! let list = Target::list([minion.to_string()]);
//! assert_eq!(list.target_type(), TargetType::List);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod target;

pub use error::{CoreError, Result};
pub use ids::{IdError, JobId, MinionId};
pub use target::{Target, TargetType, WireTarget};
