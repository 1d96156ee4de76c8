//! Constraint domain model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Comparison operator of a constraint. The member set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Ereg,
    Nereg,
    In,
    Notin,
    Contains,
    Notcontains,
}

/// Returned when a string names no [`Operator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Ereg,
        Operator::Nereg,
        Operator::In,
        Operator::Notin,
        Operator::Contains,
        Operator::Notcontains,
    ];

    /// Converts to the stored / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Ereg => "EREG",
            Operator::Nereg => "NEREG",
            Operator::In => "IN",
            Operator::Notin => "NOTIN",
            Operator::Contains => "CONTAINS",
            Operator::Notcontains => "NOTCONTAINS",
        }
    }

    /// Whether the constraint value must be a JSON array literal.
    pub fn expects_array(&self) -> bool {
        matches!(
            self,
            Operator::In | Operator::Notin | Operator::Contains | Operator::Notcontains
        )
    }
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate narrowing which requests match a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub id: i64,
    pub property: String,
    pub operator: Operator,
    /// JSON-encoded literal, e.g. `"NY"` or `["NY", "CA"]`.
    pub value: String,
}

/// Request payload for creating or replacing a constraint.
///
/// `operator` stays a plain string so an unknown member is reported as a
/// validation error instead of a body rejection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConstraintRequest {
    #[validate(length(min = 1, message = "Property must not be empty"))]
    pub property: String,

    pub operator: String,

    pub value: String,
}

pub type PutConstraintRequest = CreateConstraintRequest;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trips_through_str() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_operator() {
        let err = "LIKE".parse::<Operator>().unwrap_err();
        assert_eq!(err.to_string(), "unknown operator 'LIKE'");
        // case-sensitive
        assert!("eq".parse::<Operator>().is_err());
    }

    #[test]
    fn test_operator_serde_matches_as_str() {
        assert_eq!(serde_json::to_string(&Operator::Notin).unwrap(), "\"NOTIN\"");
        let op: Operator = serde_json::from_str("\"NOTCONTAINS\"").unwrap();
        assert_eq!(op, Operator::Notcontains);
    }

    #[test]
    fn test_expects_array() {
        assert!(Operator::In.expects_array());
        assert!(Operator::Notin.expects_array());
        assert!(Operator::Contains.expects_array());
        assert!(Operator::Notcontains.expects_array());
        assert!(!Operator::Eq.expects_array());
        assert!(!Operator::Ereg.expects_array());
    }

    #[test]
    fn test_constraint_request_requires_property() {
        let request = CreateConstraintRequest {
            property: String::new(),
            operator: "EQ".into(),
            value: "\"NY\"".into(),
        };
        assert!(request.validate().is_err());
    }
}
