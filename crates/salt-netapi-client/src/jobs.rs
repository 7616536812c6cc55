//! Job history: `GET jobs` and `GET jobs/{id}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::Method;
use salt_netapi_core::{JobId, Target};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NetapiError, Result};
use crate::session::NO_BODY;
use crate::time::parse_job_time;
use crate::SaltClient;

/// Key marking an argument map as keyword arguments.
pub const KWARG_SENTINEL: &str = "__kwarg__";

/// Summary of a job as recorded by the master's job cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    /// Job id.
    pub id: JobId,
    /// Executed function, e.g. `cmd.run`.
    pub function: String,
    /// Minions the job was addressed to.
    pub target: Target,
    /// Positional arguments, in submission order.
    pub arguments: Vec<Value>,
    /// Keyword arguments.
    pub kw_arguments: Map<String, Value>,
    /// When the job was published.
    pub start_time: DateTime<Utc>,
    /// User who submitted the job.
    pub user: String,
}

/// A job together with its per-minion returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetails {
    /// The job summary.
    #[serde(flatten)]
    pub job: Job,
    /// Minions that received the job.
    pub minions: Vec<String>,
    /// Return value per minion id.
    pub returns: Map<String, Value>,
    /// Error the master recorded for the job itself.
    pub error: Option<String>,
}

/// Split a raw argument list into positional and keyword arguments.
///
/// A map whose [`KWARG_SENTINEL`] entry is `true` contributes its other
/// entries to the keyword arguments; every other element stays positional,
/// in order.
pub fn split_arguments<I>(raw: I) -> (Vec<Value>, Map<String, Value>)
where
    I: IntoIterator<Item = Value>,
{
    let mut args = Vec::new();
    let mut kwargs = Map::new();

    for arg in raw {
        match arg {
            Value::Object(mut map) if map.get(KWARG_SENTINEL) == Some(&Value::Bool(true)) => {
                map.remove(KWARG_SENTINEL);
                kwargs.extend(map);
            }
            other => args.push(other),
        }
    }

    (args, kwargs)
}

/// Per-minion entry of a job's `Result` field.
#[derive(Debug, Deserialize)]
struct RawMinionResult {
    #[serde(rename = "return", default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RawJobInfo {
    #[serde(rename = "jid", default)]
    id: Option<String>,
    #[serde(rename = "Function", default)]
    function: Option<String>,
    #[serde(rename = "Target", default)]
    target: Option<Value>,
    #[serde(rename = "Target-type", default)]
    target_type: Option<String>,
    #[serde(rename = "User", default)]
    user: Option<String>,
    #[serde(rename = "StartTime", default)]
    start_time: Option<String>,
    #[serde(rename = "Minions", default)]
    minions: Option<Vec<String>>,
    #[serde(rename = "Arguments", default)]
    arguments: Option<Vec<Value>>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
    #[serde(rename = "Result", default)]
    result: Option<BTreeMap<String, RawMinionResult>>,
}

impl RawJobInfo {
    /// Whether the entry describes a job at all, as opposed to an error stub.
    fn has_descriptor(&self) -> bool {
        self.function.is_some() || self.target.is_some()
    }

    fn into_job(self, id: &str) -> Result<(Job, JobExtras)> {
        let missing = |field: &str| {
            NetapiError::MalformedResponse(format!("job {id} has no {field} field"))
        };

        let function = self.function.ok_or_else(|| missing("Function"))?;
        let raw_target = self.target.ok_or_else(|| missing("Target"))?;
        let target_type = self.target_type.ok_or_else(|| missing("Target-type"))?;
        let user = self.user.ok_or_else(|| missing("User"))?;
        // Stubs for unknown jobs carry an empty StartTime.
        let raw_start = self
            .start_time
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("StartTime"))?;
        let start_time = parse_job_time(&raw_start).ok_or_else(|| {
            NetapiError::MalformedResponse(format!("job {id} has invalid StartTime: {raw_start}"))
        })?;

        let target = Target::from_wire(&raw_target, &target_type)?;
        if target.target_type().is_unrecognized() {
            tracing::warn!(jid = id, target_type = %target_type, "Job uses an unrecognized target type");
        }

        let (arguments, kw_arguments) = split_arguments(self.arguments.unwrap_or_default());

        let job = Job {
            id: id.parse()?,
            function,
            target,
            arguments,
            kw_arguments,
            start_time,
            user,
        };
        let extras = JobExtras {
            minions: self.minions.unwrap_or_default(),
            result: self.result,
            error: self.error,
        };
        Ok((job, extras))
    }
}

/// Fields only present on the job detail endpoint.
struct JobExtras {
    minions: Vec<String>,
    result: Option<BTreeMap<String, RawMinionResult>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobDetailEnvelope {
    #[serde(default)]
    info: Vec<RawJobInfo>,
    #[serde(rename = "return", default)]
    returns: Vec<Option<Map<String, Value>>>,
}

#[derive(Debug, Deserialize)]
struct JobListEnvelope {
    #[serde(rename = "return", default)]
    items: Vec<BTreeMap<String, RawJobInfo>>,
}

fn decode_job_details(id: &JobId, envelope: JobDetailEnvelope) -> Result<JobDetails> {
    let JobDetailEnvelope { mut info, returns } = envelope;
    if info.len() != 1 {
        return Err(NetapiError::UnexpectedResultCount {
            expected: 1,
            actual: info.len(),
        });
    }
    let raw = info.swap_remove(0);

    let Some(jid) = raw.id.clone() else {
        return Err(NetapiError::JobNotFound(id.to_string()));
    };
    if !raw.has_descriptor() {
        tracing::debug!(jid = %id, error = ?raw.error, "Master has no record of job");
        return Err(NetapiError::JobNotFound(id.to_string()));
    }

    let (job, extras) = raw.into_job(&jid)?;

    let returns = match returns.into_iter().next().flatten() {
        Some(map) => map,
        None => extras
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|(minion, result)| (minion, result.value))
            .collect(),
    };

    Ok(JobDetails {
        job,
        minions: extras.minions,
        returns,
        error: extras.error,
    })
}

fn decode_job_list(envelope: JobListEnvelope) -> Result<Vec<Job>> {
    if envelope.items.len() != 1 {
        return Err(NetapiError::UnexpectedResultCount {
            expected: 1,
            actual: envelope.items.len(),
        });
    }

    envelope
        .items
        .into_iter()
        .flatten()
        .map(|(jid, raw)| raw.into_job(&jid).map(|(job, _)| job))
        .collect()
}

impl SaltClient {
    /// Retrieve a single job with its per-minion returns.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::JobNotFound`] if the master has no such job,
    /// [`NetapiError::UnexpectedResultCount`] if the response does not hold
    /// exactly one job, and [`NetapiError::MalformedResponse`] if the job
    /// record is incomplete.
    pub async fn job(&self, id: &JobId) -> Result<JobDetails> {
        tracing::debug!(jid = %id, "Sending job details request");
        let envelope: JobDetailEnvelope = self
            .session()
            .send(Method::GET, &format!("jobs/{id}"), NO_BODY)
            .await?;
        decode_job_details(id, envelope)
    }

    /// List the jobs in the master's job cache, ordered by job id.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::UnexpectedResultCount`] if the response does not
    /// hold exactly one job mapping, or [`NetapiError::MalformedResponse`] if
    /// any job record is incomplete.
    pub async fn jobs(&self) -> Result<Vec<Job>> {
        tracing::debug!("Sending job list request");
        let envelope: JobListEnvelope = self.session().send(Method::GET, "jobs", NO_BODY).await?;
        decode_job_list(envelope)
    }
}
