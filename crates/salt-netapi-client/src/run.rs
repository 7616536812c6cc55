//! Command runner for `POST run`.
//!
//! Each [`Command`] becomes one lowstate entry carrying its own credentials,
//! so `run` does not depend on the session token. The whole batch is sent in
//! one request and the master answers with one result per entry, in order.

use reqwest::Method;
use salt_netapi_core::Target;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NetapiError, Result};
use crate::session::Credentials;
use crate::SaltClient;

/// Keyword used to request the full return structure.
const FULL_RETURN: &str = "full_return";

/// Execution surface a command runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandClient {
    /// Execution modules on targeted minions.
    Local,
    /// Runner modules on the master.
    Runner,
    /// Wheel modules on the master.
    Wheel,
}

/// An ad-hoc command for `POST run`.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Execution surface.
    pub client: CommandClient,
    /// Minions to run on. Only used by [`CommandClient::Local`].
    pub target: Option<Target>,
    /// Function to execute.
    pub function: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
    /// Ask the master for the full return structure.
    pub full_return: bool,
}

impl Command {
    fn new(client: CommandClient, target: Option<Target>, function: impl Into<String>) -> Self {
        Self {
            client,
            target,
            function: function.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            full_return: false,
        }
    }

    /// An execution module call on the minions matched by `target`.
    pub fn local(target: Target, function: impl Into<String>) -> Self {
        Self::new(CommandClient::Local, Some(target), function)
    }

    /// A runner module call on the master.
    pub fn runner(function: impl Into<String>) -> Self {
        Self::new(CommandClient::Runner, None, function)
    }

    /// A wheel module call on the master.
    pub fn wheel(function: impl Into<String>) -> Self {
        Self::new(CommandClient::Wheel, None, function)
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Request the full return structure.
    #[must_use]
    pub fn full_return(mut self, full_return: bool) -> Self {
        self.full_return = full_return;
        self
    }

    fn to_request<'a>(&'a self, credentials: &'a Credentials) -> RunRequest<'a> {
        let mut kwargs = self.kwargs.clone();
        let mut full_return = self.full_return;

        // wheel refuses a top-level full_return when it also appears in kwarg
        if self.client == CommandClient::Wheel && full_return {
            kwargs.insert(FULL_RETURN.to_string(), Value::Bool(true));
            full_return = false;
        }

        RunRequest {
            client: self.client,
            target: match self.client {
                CommandClient::Local => self.target.as_ref(),
                CommandClient::Runner | CommandClient::Wheel => None,
            },
            function: &self.function,
            args: &self.args,
            kwargs,
            full_return,
            credentials,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    client: CommandClient,
    #[serde(flatten)]
    target: Option<&'a Target>,
    #[serde(rename = "fun")]
    function: &'a str,
    #[serde(rename = "arg", skip_serializing_if = "<[Value]>::is_empty")]
    args: &'a [Value],
    #[serde(rename = "kwarg", skip_serializing_if = "Map::is_empty")]
    kwargs: Map<String, Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    full_return: bool,
    #[serde(flatten)]
    credentials: &'a Credentials,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    #[serde(rename = "return", default)]
    items: Vec<Value>,
}

impl SaltClient {
    /// Run a batch of commands and return one result per command, in order.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::UnexpectedResultCount`] if the master does not
    /// answer with exactly one result per command.
    pub async fn run_jobs(&self, commands: &[Command]) -> Result<Vec<Value>> {
        let session = self.session();
        let batch: Vec<RunRequest<'_>> = commands
            .iter()
            .map(|cmd| cmd.to_request(session.credentials()))
            .collect();

        tracing::debug!(commands = batch.len(), "Sending run request");
        let envelope: RunEnvelope = session.send(Method::POST, "run", Some(&batch)).await?;

        if envelope.items.len() != commands.len() {
            return Err(NetapiError::UnexpectedResultCount {
                expected: commands.len(),
                actual: envelope.items.len(),
            });
        }
        Ok(envelope.items)
    }

    /// Run a single command.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::UnexpectedResultCount`] unless exactly one
    /// result comes back.
    pub async fn run_job(&self, command: &Command) -> Result<Value> {
        let mut results = self.run_jobs(std::slice::from_ref(command)).await?;
        results
            .pop()
            .ok_or(NetapiError::UnexpectedResultCount {
                expected: 1,
                actual: 0,
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_support::{mock_client, recording_client};

    fn credentials() -> Credentials {
        Credentials {
            username: "salt".into(),
            password: "secret".into(),
            backend: "pam".into(),
        }
    }

    fn wire(command: &Command) -> Value {
        serde_json::to_value(command.to_request(&credentials())).unwrap()
    }

    #[test]
    fn local_command_carries_target_and_credentials() {
        let cmd = Command::local(Target::glob("*"), "cmd.run")
            .arg("echo hello")
            .kwarg("shell", "/bin/bash");

        assert_eq!(
            wire(&cmd),
            json!({
                "client": "local",
                "tgt": "*",
                "tgt_type": "glob",
                "fun": "cmd.run",
                "arg": ["echo hello"],
                "kwarg": {"shell": "/bin/bash"},
                "username": "salt",
                "password": "secret",
                "eauth": "pam"
            })
        );
    }

    #[test]
    fn list_target_is_sent_as_array() {
        let cmd = Command::local(Target::list(["minion1", "minion2"]), "test.ping");
        let body = wire(&cmd);
        assert_eq!(body["tgt"], json!(["minion1", "minion2"]));
        assert_eq!(body["tgt_type"], "list");
    }

    #[test]
    fn runner_omits_target_and_empty_fields() {
        let body = wire(&Command::runner("manage.up").full_return(true));
        assert_eq!(
            body,
            json!({
                "client": "runner",
                "fun": "manage.up",
                "full_return": true,
                "username": "salt",
                "password": "secret",
                "eauth": "pam"
            })
        );
    }

    #[test]
    fn wheel_folds_full_return_into_kwarg() {
        let body = wire(&Command::wheel("key.list_all").full_return(true));
        assert!(body.get("full_return").is_none());
        assert_eq!(body["kwarg"], json!({"full_return": true}));

        let plain = wire(&Command::wheel("key.list_all"));
        assert!(plain.get("full_return").is_none());
        assert!(plain.get("kwarg").is_none());
    }

    #[tokio::test]
    async fn runs_batch_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .and(body_json(json!([
                {
                    "client": "local", "tgt": "*", "tgt_type": "glob", "fun": "test.ping",
                    "username": "salt", "password": "secret", "eauth": "pam"
                },
                {
                    "client": "runner", "fun": "jobs.list_jobs",
                    "username": "salt", "password": "secret", "eauth": "pam"
                }
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "return": [
                    {"minion1": true, "minion2": true},
                    {"20200120025629463543": {"Function": "test.ping"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        // run authenticates per request, so no login is needed
        let client = mock_client(&server);
        let results = client
            .run_jobs(&[
                Command::local(Target::glob("*"), "test.ping"),
                Command::runner("jobs.list_jobs"),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], json!({"minion1": true, "minion2": true}));
        assert!(results[1].get("20200120025629463543").is_some());
    }

    #[tokio::test]
    async fn single_run_requires_one_result() {
        let (client, transport) = recording_client();
        transport.push_ok(br#"{"return": [{"minion1": true}]}"#);
        let result = client
            .run_job(&Command::local(Target::glob("minion1"), "test.ping"))
            .await
            .unwrap();
        assert_eq!(result, json!({"minion1": true}));

        transport.push_ok(br#"{"return": []}"#);
        let err = client
            .run_job(&Command::runner("manage.up"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NetapiError::UnexpectedResultCount {
                expected: 1,
                actual: 0
            }
        ));
    }
}
