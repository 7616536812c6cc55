//! Subcommands and their dispatch onto [`SaltClient`].

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Subcommand, ValueEnum};
use salt_netapi_client::{Command, MinionJob, SaltClient};
use salt_netapi_core::{JobId, MinionId, Target};
use serde_json::{Map, Value};

/// Operations exposed by the CLI.
#[derive(Subcommand, Debug)]
pub enum Action {
    /// List all minions and their grains.
    Minions,

    /// Show one minion and its grains.
    Minion {
        /// Minion id.
        id: MinionId,
    },

    /// Publish a job asynchronously and print the job id.
    Submit {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        call: CallArgs,
    },

    /// List jobs in the master's job cache.
    Jobs,

    /// Show a job with its per-minion returns.
    Job {
        /// Job id.
        id: JobId,
    },

    /// Run a command synchronously and print its result.
    Run {
        /// Execution surface.
        #[arg(long, value_enum, default_value_t = Surface::Local)]
        client: Surface,

        /// Target expression, required for the local client.
        #[arg(long)]
        target: Option<String>,

        /// Target type.
        #[arg(long, default_value = "glob")]
        target_type: String,

        #[command(flatten)]
        call: CallArgs,

        /// Request the full return structure.
        #[arg(long)]
        full_return: bool,
    },

    /// List keys by state.
    Keys,

    /// Show the fingerprint of a minion's key.
    Key {
        /// Minion id.
        id: MinionId,
    },

    /// Generate and accept a key pair for a minion.
    GenerateKey {
        /// Minion id.
        id: MinionId,

        /// Key size in bits.
        #[arg(long)]
        key_size: Option<u32>,

        /// Replace an existing accepted key.
        #[arg(long)]
        force: bool,
    },

    /// Fire an event through the hook endpoint.
    Hook {
        /// Event tag, e.g. `deploy/web`.
        tag: String,

        /// JSON event data.
        #[arg(long)]
        data: Option<String>,
    },

    /// Show the API server statistics.
    Stats,
}

/// Execution surface for `run`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Execution modules on minions.
    Local,
    /// Runner modules on the master.
    Runner,
    /// Wheel modules on the master.
    Wheel,
}

/// Minion targeting flags.
#[derive(ClapArgs, Debug)]
pub struct TargetArgs {
    /// Target expression. For `list`, a comma separated list of ids.
    #[arg(long)]
    target: String,

    /// Target type.
    #[arg(long, default_value = "glob")]
    target_type: String,
}

impl TargetArgs {
    fn to_target(&self) -> anyhow::Result<Target> {
        build_target(&self.target, &self.target_type)
    }
}

/// Function and arguments of a call.
#[derive(ClapArgs, Debug)]
pub struct CallArgs {
    /// Function to execute, e.g. `test.ping`.
    #[arg(long = "fun")]
    function: String,

    /// Positional argument; JSON values are decoded, anything else is a string.
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Keyword argument as `key=value`.
    #[arg(long = "kwarg", value_parser = parse_kwarg)]
    kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    fn args(&self) -> Vec<Value> {
        self.args.iter().map(|raw| parse_value(raw)).collect()
    }

    fn kwargs(&self) -> Map<String, Value> {
        self.kwargs.iter().cloned().collect()
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_kwarg(raw: &str) -> Result<(String, Value), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), parse_value(value))),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

fn build_target(expression: &str, target_type: &str) -> anyhow::Result<Target> {
    let target = Target::from_wire(&Value::String(expression.to_string()), target_type)?;
    if target.target_type().is_unrecognized() {
        tracing::warn!(target_type, "Unrecognized target type; the master may reject it");
    }
    Ok(target)
}

impl Action {
    /// Perform the operation and return its result as JSON.
    pub async fn execute(&self, client: &SaltClient) -> anyhow::Result<Value> {
        let output = match self {
            Self::Minions => serde_json::to_value(client.minions().await?)?,
            Self::Minion { id } => serde_json::to_value(client.minion(id).await?)?,
            Self::Submit { target, call } => {
                let job = MinionJob {
                    target: target.to_target()?,
                    function: call.function.clone(),
                    args: call.args(),
                    kwargs: call.kwargs(),
                };
                match client.submit_job(&job).await? {
                    Some(receipt) => serde_json::to_value(receipt)?,
                    None => bail!("target matched no minions"),
                }
            }
            Self::Jobs => serde_json::to_value(client.jobs().await?)?,
            Self::Job { id } => serde_json::to_value(client.job(id).await?)?,
            Self::Run {
                client: surface,
                target,
                target_type,
                call,
                full_return,
            } => {
                let mut command = match (surface, target) {
                    (Surface::Local, Some(expr)) => {
                        Command::local(build_target(expr, target_type)?, call.function.clone())
                    }
                    (Surface::Local, None) => bail!("--target is required for the local client"),
                    (Surface::Runner, _) => Command::runner(call.function.clone()),
                    (Surface::Wheel, _) => Command::wheel(call.function.clone()),
                };
                command.args = call.args();
                command.kwargs = call.kwargs();
                client
                    .run_job(&command.full_return(*full_return))
                    .await?
            }
            Self::Keys => serde_json::to_value(client.keys().await?)?,
            Self::Key { id } => Value::String(client.key(id).await?),
            Self::GenerateKey {
                id,
                key_size,
                force,
            } => serde_json::to_value(client.generate_key_pair(id, *key_size, *force).await?)?,
            Self::Hook { tag, data } => {
                let body = data
                    .as_deref()
                    .map(serde_json::from_str::<Value>)
                    .transpose()
                    .context("--data is not valid JSON")?;
                client.hook(tag, body.as_ref()).await?;
                serde_json::json!({ "success": true })
            }
            Self::Stats => Value::Object(client.stats().await?),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use salt_netapi_core::TargetType;
    use serde_json::json;

    use super::*;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(subcommand)]
        action: Action,
    }

    #[test]
    fn parses_kwarg_values() {
        assert_eq!(
            parse_kwarg("timeout=30").unwrap(),
            ("timeout".to_string(), json!(30))
        );
        assert_eq!(
            parse_kwarg("shell=/bin/bash").unwrap(),
            ("shell".to_string(), json!("/bin/bash"))
        );
        assert!(parse_kwarg("novalue").is_err());
        assert!(parse_kwarg("=x").is_err());
    }

    #[test]
    fn builds_list_target_from_commas() {
        let target = build_target("minion1,minion2", "list").unwrap();
        assert_eq!(target, Target::list(["minion1", "minion2"]));

        let grain = build_target("os:Debian", "grain").unwrap();
        assert_eq!(grain.target_type(), TargetType::Grain);
    }

    #[test]
    fn parses_submit_command() {
        let cli = Cli::parse_from([
            "saltapi", "submit", "--target", "web*", "--fun", "cmd.run", "--arg", "uptime",
            "--kwarg", "runas=salt",
        ]);
        match cli.action {
            Action::Submit { target, call } => {
                assert_eq!(target.to_target().unwrap(), Target::glob("web*"));
                assert_eq!(call.args(), vec![json!("uptime")]);
                assert_eq!(call.kwargs()["runas"], json!("salt"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_minion_id() {
        assert!(Cli::try_parse_from(["saltapi", "minion", "a/b"]).is_err());
    }
}
