//! Async client for the Salt master `rest_cherrypy` NetAPI.
//!
//! This crate provides:
//!
//! - Session handling: login, logout and `X-Auth-Token` request signing
//! - Typed decoders for the minion, job and key endpoints, including the tar
//!   archive returned by key generation
//! - A batch command runner for the `local`, `runner` and `wheel` clients
//! - Webhook events and server statistics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Caller         │────▶│   SaltClient     │
//! │   (CLI, app)     │     │   (operations)   │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │   Session        │
//!                          │   (token, creds) │
//!                          └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │   Transport      │
//!                          │   (trait)        │
//!                          └────────┬─────────┘
//!                                   │ HTTPS
//!                          ┌────────▼─────────┐
//!                          │   Salt master    │
//!                          │   rest_cherrypy  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use salt_netapi_client::{ClientConfig, Command, MinionJob, SaltClient, Target};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://salt.example.com:8000", "salt", "secret");
//! let client = SaltClient::new(&config)?;
//!
//! client.login().await?;
//!
//! for minion in client.minions().await? {
//!     println!("{} online: {}", minion.id, minion.has_grains());
//! }
//!
//! let receipt = client
//!     .submit_job(&MinionJob::new(Target::glob("web*"), "state.apply"))
//!     .await?;
//! if let Some(receipt) = receipt {
//!     println!("Submitted {} to {:?}", receipt.job_id, receipt.minions);
//! }
//!
//! let result = client
//!     .run_job(&Command::local(Target::list(["minion1"]), "cmd.run").arg("uptime"))
//!     .await?;
//! println!("{result}");
//!
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod archive;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod hook;
pub mod jobs;
pub mod keys;
pub mod minions;
pub mod run;
pub mod session;
pub mod stats;
pub mod time;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use archive::MinionKeyPair;
pub use auth::LoginInfo;
pub use client::SaltClient;
pub use config::ClientConfig;
pub use error::{NetapiError, Result};
pub use jobs::{split_arguments, Job, JobDetails};
pub use keys::KeyResult;
pub use minions::{AsyncMinionJobResult, Minion, MinionJob};
pub use run::{Command, CommandClient};
pub use session::{Credentials, Session};
pub use transport::{HttpTransport, OutboundRequest, Transport, AUTH_TOKEN_HEADER};

pub use salt_netapi_core::{IdError, JobId, MinionId, Target, TargetType};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_clones_share_session() {
        let config = ClientConfig::new("https://master:8000", "salt", "secret");
        let client = SaltClient::new(&config).unwrap();
        let clone = client.clone();
        assert!(std::ptr::eq(client.session(), clone.session()));
        assert!(!clone.is_authenticated());
    }

    #[test]
    fn rejects_unusable_address() {
        let config = ClientConfig::new("ftp://master", "salt", "secret");
        assert!(matches!(
            SaltClient::new(&config),
            Err(NetapiError::Config(_))
        ));
    }
}
