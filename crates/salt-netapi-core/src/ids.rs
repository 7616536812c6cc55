//! Identifier types for minions and jobs.
//!
//! Both identifiers are interpolated into endpoint paths (`minions/{id}`,
//! `jobs/{id}`, `keys/{id}`), so construction rejects values that would
//! change the shape of the URL.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Check that `value` is usable as a single URL path segment.
fn validate_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_whitespace() || c.is_control())
    {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// The identifier of a managed node (minion), as known to the master.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinionId(String);

impl MinionId {
    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MinionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_segment(s)?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinionId({})", self.0)
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MinionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_segment(&value)?;
        Ok(Self(value))
    }
}

impl From<MinionId> for String {
    fn from(id: MinionId) -> Self {
        id.0
    }
}

impl AsRef<str> for MinionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A Salt job identifier (`jid`).
///
/// Masters normally issue 20-digit ids of the form `YYYYMMDDhhmmssffffff`,
/// but any path-safe string is accepted so that lookups of foreign or
/// malformed ids still reach the master and fail there.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the submission time embedded in a standard 20-digit job id.
    ///
    /// Returns `None` when the id does not have that shape or names an
    /// impossible date.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let s = self.0.as_str();
        if s.len() != 20 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().ok();
        let year = s[0..4].parse::<i32>().ok()?;
        let micros = field(14..20)?;

        NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?
            .and_hms_micro_opt(field(8..10)?, field(10..12)?, field(12..14)?, micros)
            .map(|naive| naive.and_utc())
    }
}

impl FromStr for JobId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_segment(s)?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_segment(&value)?;
        Ok(Self(value))
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input string is empty.
    #[error("identifier is empty")]
    Empty,

    /// The input contains a character that cannot appear in a path segment.
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}
