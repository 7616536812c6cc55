//! Minion inventory and asynchronous job submission: `GET minions`,
//! `GET minions/{id}` and `POST minions`.

use std::collections::BTreeMap;

use reqwest::Method;
use salt_netapi_core::{JobId, MinionId, Target};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NetapiError, Result};
use crate::session::NO_BODY;
use crate::SaltClient;

/// A minion and its grains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Minion {
    /// Minion id.
    pub id: String,
    /// Grain data. `None` when the minion is offline and the master returned
    /// no grains for it.
    pub grains: Option<Map<String, Value>>,
}

impl Minion {
    /// Returns `true` if the master reported grains for this minion.
    #[must_use]
    pub fn has_grains(&self) -> bool {
        self.grains.is_some()
    }
}

/// A job to publish asynchronously to minions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinionJob {
    /// Minions to run on.
    #[serde(flatten)]
    pub target: Target,
    /// Function to execute, e.g. `test.ping`.
    #[serde(rename = "fun")]
    pub function: String,
    /// Positional arguments.
    #[serde(rename = "arg", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(rename = "kwarg", skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
}

impl MinionJob {
    /// Create a job with no arguments.
    pub fn new(target: Target, function: impl Into<String>) -> Self {
        Self {
            target,
            function: function.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
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
}

/// Receipt for an asynchronously published job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncMinionJobResult {
    /// Id under which the job can be looked up.
    #[serde(rename = "jid")]
    pub job_id: JobId,
    /// Minions the target matched.
    #[serde(default)]
    pub minions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MinionsEnvelope {
    #[serde(rename = "return", default)]
    items: Vec<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SubmitEnvelope {
    #[serde(rename = "return", default)]
    items: Vec<Map<String, Value>>,
}

fn decode_minions(envelope: MinionsEnvelope) -> Result<Vec<Minion>> {
    if envelope.items.len() != 1 {
        return Err(NetapiError::UnexpectedResultCount {
            expected: 1,
            actual: envelope.items.len(),
        });
    }

    Ok(envelope
        .items
        .into_iter()
        .flatten()
        .map(|(id, data)| Minion {
            id,
            // Offline minions are reported with a non-map placeholder.
            grains: match data {
                Value::Object(grains) => Some(grains),
                _ => None,
            },
        })
        .collect())
}

/// Decode one receipt per submitted job. A target that matched no minions
/// yields an empty object, which becomes `None` at the same index.
fn decode_submissions(
    submitted: usize,
    envelope: SubmitEnvelope,
) -> Result<Vec<Option<AsyncMinionJobResult>>> {
    if envelope.items.len() != submitted {
        return Err(NetapiError::UnexpectedResultCount {
            expected: submitted,
            actual: envelope.items.len(),
        });
    }

    envelope
        .items
        .into_iter()
        .map(|entry| {
            if entry.is_empty() {
                return Ok(None);
            }
            serde_json::from_value(Value::Object(entry))
                .map(Some)
                .map_err(|e| NetapiError::malformed("minions", e))
        })
        .collect()
}

impl SaltClient {
    /// Retrieve a minion and its grains.
    ///
    /// An offline minion is returned with `grains: None`.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::MinionNotFound`] if the master does not know
    /// the minion.
    pub async fn minion(&self, id: &MinionId) -> Result<Minion> {
        tracing::debug!(minion = %id, "Sending minion request");
        let envelope: MinionsEnvelope = self
            .session()
            .send(Method::GET, &format!("minions/{id}"), NO_BODY)
            .await?;

        let minions = decode_minions(envelope)?;
        minions
            .into_iter()
            .find(|m| m.id == id.as_str())
            .ok_or_else(|| NetapiError::MinionNotFound(id.to_string()))
    }

    /// Retrieve all minions known to the master, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::UnexpectedResultCount`] if the response does not
    /// hold exactly one minion mapping.
    pub async fn minions(&self) -> Result<Vec<Minion>> {
        tracing::debug!("Sending minion list request");
        let envelope: MinionsEnvelope = self.session().send(Method::GET, "minions", NO_BODY).await?;
        decode_minions(envelope)
    }

    /// Publish several jobs asynchronously in one request.
    ///
    /// The result has one entry per submitted job, in order. Entries are
    /// `None` where the target matched no minions.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::UnexpectedResultCount`] if the master does not
    /// answer with one entry per job.
    pub async fn submit_jobs(&self, jobs: &[MinionJob]) -> Result<Vec<Option<AsyncMinionJobResult>>> {
        tracing::debug!(count = jobs.len(), "Submitting minion jobs");
        let envelope: SubmitEnvelope = self
            .session()
            .send(Method::POST, "minions", Some(jobs))
            .await?;
        decode_submissions(jobs.len(), envelope)
    }

    /// Publish a single job asynchronously.
    ///
    /// Returns `None` if the target matched no minions.
    ///
    /// # Errors
    ///
    /// See [`SaltClient::submit_jobs`].
    pub async fn submit_job(&self, job: &MinionJob) -> Result<Option<AsyncMinionJobResult>> {
        let mut results = self.submit_jobs(std::slice::from_ref(job)).await?;
        Ok(results.pop().flatten())
    }
}
