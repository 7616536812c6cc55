//! Minion targeting.
//!
//! A [`Target`] selects the subset of minions a command or job applies to.
//! On the wire every target becomes exactly two fields: `tgt` (a string, or
//! an array of minion ids for list targeting) and `tgt_type`.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// The targeting mode the master uses to interpret `tgt`.
///
/// Type tags received from a master that this client does not know are kept
/// verbatim in [`TargetType::Unrecognized`] instead of being folded into
/// [`TargetType::Glob`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetType {
    /// Shell-style glob on minion ids.
    Glob,
    /// Perl-compatible regular expression on minion ids.
    Pcre,
    /// Explicit list of minion ids.
    List,
    /// Grain comparison.
    Grain,
    /// Grain comparison with a regular expression.
    GrainPcre,
    /// Pillar comparison.
    Pillar,
    /// Pillar comparison with a regular expression.
    PillarPcre,
    /// Named nodegroup from the master configuration.
    NodeGroup,
    /// Range server expression.
    Range,
    /// Compound expression combining other matchers.
    Compound,
    /// Subnet (CIDR notation) or IPv4 address.
    IpCidr,
    /// A tag this client does not know, as received.
    Unrecognized(String),
}

impl TargetType {
    /// Every type this client can send.
    pub const KNOWN: [Self; 11] = [
        Self::Glob,
        Self::Pcre,
        Self::List,
        Self::Grain,
        Self::GrainPcre,
        Self::Pillar,
        Self::PillarPcre,
        Self::NodeGroup,
        Self::Range,
        Self::Compound,
        Self::IpCidr,
    ];

    /// The wire tag for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Glob => "glob",
            Self::Pcre => "pcre",
            Self::List => "list",
            Self::Grain => "grain",
            Self::GrainPcre => "grain_pcre",
            Self::Pillar => "pillar",
            Self::PillarPcre => "pillar_pcre",
            Self::NodeGroup => "nodegroup",
            Self::Range => "range",
            Self::Compound => "compound",
            Self::IpCidr => "ipcidr",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Returns `true` for [`TargetType::Unrecognized`].
    #[must_use]
    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized(_))
    }

    /// Map a wire tag to a type; unknown tags become [`TargetType::Unrecognized`].
    #[must_use]
    pub fn from_wire(tag: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|known| known.as_str() == tag)
            .unwrap_or_else(|| Self::Unrecognized(tag.to_string()))
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_wire(s))
    }
}

impl From<String> for TargetType {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<TargetType> for String {
    fn from(value: TargetType) -> Self {
        match value {
            TargetType::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// An addressing expression selecting a subset of minions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A free-form expression interpreted by the master according to its type.
    Expression {
        /// The expression text, e.g. `web*` or `G@os:Debian and webserv*`.
        expression: String,
        /// How the master should interpret the expression.
        target_type: TargetType,
    },
    /// An explicit list of minion ids. Always sent with type `list`.
    List(Vec<String>),
}

/// The `tgt` wire value of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireTarget<'a> {
    /// A single expression string.
    Expression(&'a str),
    /// An array of minion ids.
    List(&'a [String]),
}

impl Target {
    /// Target minions matching `expression` under `target_type`.
    pub fn expression(expression: impl Into<String>, target_type: TargetType) -> Self {
        Self::Expression {
            expression: expression.into(),
            target_type,
        }
    }

    /// Target minions whose id matches a shell-style glob.
    pub fn glob(expression: impl Into<String>) -> Self {
        Self::expression(expression, TargetType::Glob)
    }

    /// Target minions with a compound expression.
    pub fn compound(expression: impl Into<String>) -> Self {
        Self::expression(expression, TargetType::Compound)
    }

    /// Target minions by a `key:value` grain match.
    pub fn grain(expression: impl Into<String>) -> Self {
        Self::expression(expression, TargetType::Grain)
    }

    /// Target an explicit list of minion ids.
    pub fn list<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(ids.into_iter().map(Into::into).collect())
    }

    /// The value sent as `tgt`.
    #[must_use]
    pub fn wire_value(&self) -> WireTarget<'_> {
        match self {
            Self::Expression { expression, .. } => WireTarget::Expression(expression),
            Self::List(ids) => WireTarget::List(ids),
        }
    }

    /// The value sent as `tgt_type`.
    #[must_use]
    pub fn target_type(&self) -> TargetType {
        match self {
            Self::Expression { target_type, .. } => target_type.clone(),
            Self::List(_) => TargetType::List,
        }
    }

    /// Rebuild a target from the `Target`/`Target-type` pair the master reports
    /// for a job.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTarget`] if the value's shape does not fit
    /// the type: `list` requires an array of strings, every other type a string.
    pub fn from_wire(value: &Value, type_tag: &str) -> Result<Self> {
        let target_type = TargetType::from_wire(type_tag);
        let invalid = |reason: &str| CoreError::InvalidTarget {
            target_type: type_tag.to_string(),
            reason: reason.to_string(),
        };

        match (target_type, value) {
            (TargetType::List, Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(ToString::to_string)
                        .ok_or_else(|| invalid("list entries must be strings"))
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            // Older masters report list targets as a comma separated string.
            (TargetType::List, Value::String(s)) => Ok(Self::List(
                s.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(ToString::to_string)
                    .collect(),
            )),
            (TargetType::List, _) => Err(invalid("expected an array of minion ids")),
            (target_type, Value::String(s)) => Ok(Self::expression(s.clone(), target_type)),
            (_, _) => Err(invalid("expected an expression string")),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Target", 2)?;
        state.serialize_field("tgt", &self.wire_value())?;
        state.serialize_field("tgt_type", self.target_type().as_str())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn known_types_round_trip_through_wire_tag() {
        for known in TargetType::KNOWN {
            assert_eq!(TargetType::from_wire(known.as_str()), known);
        }
    }

    #[test]
    fn unknown_type_is_not_glob() {
        let parsed = TargetType::from_wire("ldap");
        assert_eq!(parsed, TargetType::Unrecognized("ldap".to_string()));
        assert!(parsed.is_unrecognized());
        assert_eq!(parsed.as_str(), "ldap");

        let empty = TargetType::from_wire("");
        assert!(empty.is_unrecognized());
        assert_ne!(empty, TargetType::Glob);
    }

    #[test]
    fn list_target_always_reports_list() {
        let target = Target::list(["minion1", "minion2"]);
        assert_eq!(target.target_type(), TargetType::List);
        assert_eq!(
            target.wire_value(),
            WireTarget::List(&["minion1".to_string(), "minion2".to_string()])
        );
    }

    #[test]
    fn expression_target_wire_fields() {
        let target = Target::compound("G@os:Debian and web*");
        assert_eq!(target.target_type(), TargetType::Compound);
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({"tgt": "G@os:Debian and web*", "tgt_type": "compound"})
        );
    }

    #[test]
    fn list_target_serializes_array() {
        let target = Target::list(["a", "b"]);
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({"tgt": ["a", "b"], "tgt_type": "list"})
        );
    }

    #[test]
    fn from_wire_expression() {
        let target = Target::from_wire(&json!("*"), "glob").unwrap();
        assert_eq!(target, Target::glob("*"));
    }

    #[test]
    fn from_wire_list() {
        let target = Target::from_wire(&json!(["minion1", "minion2"]), "list").unwrap();
        assert_eq!(target, Target::list(["minion1", "minion2"]));

        let legacy = Target::from_wire(&json!("minion1, minion2"), "list").unwrap();
        assert_eq!(legacy, Target::list(["minion1", "minion2"]));

        let single = Target::from_wire(&json!("*"), "list").unwrap();
        assert_eq!(single, Target::list(["*"]));
    }

    #[test]
    fn from_wire_keeps_unrecognized_type() {
        let target = Target::from_wire(&json!("x"), "future_matcher").unwrap();
        assert_eq!(
            target.target_type(),
            TargetType::Unrecognized("future_matcher".to_string())
        );
    }

    #[test]
    fn from_wire_rejects_mismatched_shapes() {
        assert!(Target::from_wire(&json!(42), "list").is_err());
        assert!(Target::from_wire(&json!([1, 2]), "list").is_err());
        assert!(Target::from_wire(&json!(["a"]), "glob").is_err());
    }

    #[test]
    fn target_type_serde_uses_wire_tag() {
        assert_eq!(
            serde_json::to_value(TargetType::GrainPcre).unwrap(),
            json!("grain_pcre")
        );
        let parsed: TargetType = serde_json::from_value(json!("nodegroup")).unwrap();
        assert_eq!(parsed, TargetType::NodeGroup);
    }
}
