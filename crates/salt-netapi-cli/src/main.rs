//! Salt NetAPI CLI.
//!
//! This is the entry point for the `saltapi` binary. Every invocation logs in,
//! performs one operation, prints the result as JSON and logs out.

mod commands;

use clap::Parser;
use salt_netapi_client::{ClientConfig, SaltClient};
use tracing_subscriber::EnvFilter;

use commands::Action;

/// Salt NetAPI CLI - query and drive a Salt master over `rest_cherrypy`.
#[derive(Parser, Debug)]
#[command(name = "saltapi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Salt API URL.
    #[arg(long, env = "SALT_API_URL", default_value = "https://localhost:8000")]
    url: String,

    /// Username for external authentication.
    #[arg(long, env = "SALT_API_USER")]
    username: String,

    /// Password for external authentication.
    #[arg(long, env = "SALT_API_PASSWORD", hide_env_values = true)]
    password: String,

    /// External authentication backend.
    #[arg(long, env = "SALT_API_EAUTH", default_value = "pam")]
    eauth: String,

    /// Accept invalid TLS certificates.
    #[arg(long, env = "SALT_API_INSECURE")]
    insecure: bool,

    /// Request timeout in seconds.
    #[arg(long, env = "SALT_API_TIMEOUT")]
    timeout: Option<u64>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    action: Action,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            accept_invalid_certs: self.insecure,
            request_timeout_seconds: self.timeout,
            ..ClientConfig::new(&self.url, &self.username, &self.password).with_backend(&self.eauth)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("salt_netapi_client=debug,salt_netapi_cli=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = SaltClient::new(&args.client_config())?;
    let login = client.login().await?;
    tracing::debug!(user = %login.user, expire = ?login.expire, "Logged in");

    let result = args.action.execute(&client).await;

    // Report the operation's error ahead of a logout failure.
    if let Err(e) = client.logout().await {
        tracing::warn!("Failed to log out: {e}");
    }

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
