//! Planner error types
//!
//! Error codes:
//! - DQ_PLANNER_UNRESOLVED (WARN)
//! - DQ_PLANNER_INVALID_QUERY (WARN)
//! - DQ_PLANNER_INVALID_INDEX (WARN)
//!
//! Sarg compilation never fails; these cover the access planner only.

use std::fmt;

use crate::datastore::DatastoreError;
use crate::observability::Severity;

/// Planner-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Keyspace or indexer could not be resolved
    DqPlannerUnresolved,
    /// Malformed select request
    DqPlannerInvalidQuery,
    /// Malformed index definition
    DqPlannerInvalidIndex,
}

impl PlannerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::DqPlannerUnresolved => "DQ_PLANNER_UNRESOLVED",
            PlannerErrorCode::DqPlannerInvalidQuery => "DQ_PLANNER_INVALID_QUERY",
            PlannerErrorCode::DqPlannerInvalidIndex => "DQ_PLANNER_INVALID_INDEX",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Warn
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    /// Underlying datastore error code, if any
    cause: Option<&'static str>,
}

impl PlannerError {
    /// Create an unresolved reference error
    pub fn unresolved(err: &DatastoreError) -> Self {
        Self {
            code: PlannerErrorCode::DqPlannerUnresolved,
            message: err.to_string(),
            cause: Some(err.code()),
        }
    }

    /// Create an invalid query error
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::DqPlannerInvalidQuery,
            message: reason.into(),
            cause: None,
        }
    }

    /// Create an invalid index definition error
    pub fn invalid_index(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::DqPlannerInvalidIndex,
            message: reason.into(),
            cause: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the datastore code behind this error
    pub fn cause(&self) -> Option<&'static str> {
        self.cause
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(cause) = self.cause {
            write!(f, " (caused by {})", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for PlannerError {}

impl From<DatastoreError> for PlannerError {
    fn from(err: DatastoreError) -> Self {
        PlannerError::unresolved(&err)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PlannerErrorCode::DqPlannerUnresolved.code(),
            "DQ_PLANNER_UNRESOLVED"
        );
        assert_eq!(
            PlannerErrorCode::DqPlannerInvalidQuery.code(),
            "DQ_PLANNER_INVALID_QUERY"
        );
        assert_eq!(
            PlannerErrorCode::DqPlannerInvalidIndex.code(),
            "DQ_PLANNER_INVALID_INDEX"
        );
    }

    #[test]
    fn test_error_display() {
        let err = PlannerError::from(DatastoreError::keyspace_not_found("default", "orders"));
        let display = format!("{}", err);
        assert!(display.contains("DQ_PLANNER_UNRESOLVED"));
        assert!(display.contains("orders"));
        assert!(display.contains("DQ_KEYSPACE_NOT_FOUND"));
        assert_eq!(err.cause(), Some("DQ_KEYSPACE_NOT_FOUND"));
    }

    #[test]
    fn test_invalid_query_has_no_cause() {
        let err = PlannerError::invalid_query("empty alias");
        assert_eq!(err.code(), PlannerErrorCode::DqPlannerInvalidQuery);
        assert_eq!(err.message(), "empty alias");
        assert!(err.cause().is_none());
        assert_eq!(err.severity(), Severity::Warn);
    }
}
