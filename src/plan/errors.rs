//! # Plan Errors
//!
//! Decoding a plan fails as a whole: the first bad node aborts
//! reconstruction.

use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::expr::ExprError;
use crate::observability::Severity;

/// Result type for plan operations
pub type PlanResult<T> = Result<T, PlanError>;

/// Plan errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    // ==================
    // Decode Errors
    // ==================
    /// Not valid JSON, or a field has the wrong shape
    #[error("Malformed plan JSON: {0}")]
    Json(String),

    /// Node object without a `#operator` key
    #[error("Plan node has no #operator")]
    MissingOperator,

    /// `#operator` names no known node
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Embedded expression text does not parse
    #[error("Invalid expression in {field}: {source}")]
    Expression {
        field: &'static str,
        #[source]
        source: ExprError,
    },

    // ==================
    // Resolution Errors
    // ==================
    /// A keyspace, indexer or index named by the plan cannot be resolved
    #[error(transparent)]
    Unresolved(#[from] DatastoreError),
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::Json(err.to_string())
    }
}

impl PlanError {
    pub fn expression(field: &'static str, source: ExprError) -> Self {
        PlanError::Expression { field, source }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PlanError::Json(_) => "DQ_PLAN_JSON",
            PlanError::MissingOperator => "DQ_PLAN_MISSING_OPERATOR",
            PlanError::UnknownOperator(_) => "DQ_PLAN_UNKNOWN_OPERATOR",
            PlanError::Expression { .. } => "DQ_PLAN_EXPRESSION",
            PlanError::Unresolved(inner) => inner.code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlanError::Unresolved(inner) => inner.severity(),
            _ => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PlanError::MissingOperator.code(), "DQ_PLAN_MISSING_OPERATOR");
        assert_eq!(
            PlanError::UnknownOperator("Sort".into()).code(),
            "DQ_PLAN_UNKNOWN_OPERATOR"
        );
        let unresolved = PlanError::from(DatastoreError::IndexNotFound("ix".into()));
        assert_eq!(unresolved.code(), "DQ_INDEX_NOT_FOUND");
        assert_eq!(unresolved.to_string(), "Index not found: ix");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: PlanError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.code(), "DQ_PLAN_JSON");
        assert_eq!(err.severity(), Severity::Error);
    }
}
