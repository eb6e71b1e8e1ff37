//! Execution error types
//!
//! Error codes:
//! - DQ_EXECUTION_FAILED (ERROR)
//! - DQ_EXECUTION_STORAGE (ERROR)
//! - DQ_EXECUTION_EVALUATION (ERROR)
//! - DQ_EXECUTION_PLAN (ERROR)
//! - DQ_QUERY_CANCELLED (WARN)
//! - DQ_EXECUTION_INTERNAL (FATAL)

use std::fmt;

use crate::datastore::DatastoreError;
use crate::expr::ExprError;
use crate::observability::Severity;
use crate::plan::PlanError;

/// Execution-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorCode {
    /// Operator could not complete its work
    DqExecutionFailed,
    /// Storage call failed
    DqExecutionStorage,
    /// Expression evaluation failed
    DqExecutionEvaluation,
    /// Plan could not be turned into operators
    DqExecutionPlan,
    /// Query stopped before it finished
    DqQueryCancelled,
    /// Runtime invariant broken
    DqExecutionInternal,
}

impl ExecutionErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionErrorCode::DqExecutionFailed => "DQ_EXECUTION_FAILED",
            ExecutionErrorCode::DqExecutionStorage => "DQ_EXECUTION_STORAGE",
            ExecutionErrorCode::DqExecutionEvaluation => "DQ_EXECUTION_EVALUATION",
            ExecutionErrorCode::DqExecutionPlan => "DQ_EXECUTION_PLAN",
            ExecutionErrorCode::DqQueryCancelled => "DQ_QUERY_CANCELLED",
            ExecutionErrorCode::DqExecutionInternal => "DQ_EXECUTION_INTERNAL",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ExecutionErrorCode::DqQueryCancelled => Severity::Warn,
            ExecutionErrorCode::DqExecutionInternal => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Execution error type with full context
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    code: ExecutionErrorCode,
    message: String,
    /// Code of the underlying subsystem error, if any
    source_code: Option<&'static str>,
}

impl ExecutionError {
    /// Create an execution failed error
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutionErrorCode::DqExecutionFailed,
            message: reason.into(),
            source_code: None,
        }
    }

    /// Create a cancellation error
    pub fn cancelled() -> Self {
        Self {
            code: ExecutionErrorCode::DqQueryCancelled,
            message: "query stopped before completion".into(),
            source_code: None,
        }
    }

    /// Create an internal error (FATAL)
    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutionErrorCode::DqExecutionInternal,
            message: reason.into(),
            source_code: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ExecutionErrorCode {
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

    /// Returns the code of the wrapped subsystem error
    pub fn source_code(&self) -> Option<&'static str> {
        self.source_code
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutionError {}

impl From<DatastoreError> for ExecutionError {
    fn from(err: DatastoreError) -> Self {
        Self {
            code: ExecutionErrorCode::DqExecutionStorage,
            message: err.to_string(),
            source_code: Some(err.code()),
        }
    }
}

impl From<ExprError> for ExecutionError {
    fn from(err: ExprError) -> Self {
        Self {
            code: ExecutionErrorCode::DqExecutionEvaluation,
            message: err.to_string(),
            source_code: Some(err.code()),
        }
    }
}

impl From<PlanError> for ExecutionError {
    fn from(err: PlanError) -> Self {
        Self {
            code: ExecutionErrorCode::DqExecutionPlan,
            message: err.to_string(),
            source_code: Some(err.code()),
        }
    }
}

/// Result type for execution operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExecutionErrorCode::DqExecutionFailed.code(), "DQ_EXECUTION_FAILED");
        assert_eq!(ExecutionErrorCode::DqQueryCancelled.code(), "DQ_QUERY_CANCELLED");
        assert_eq!(ExecutionErrorCode::DqQueryCancelled.severity(), Severity::Warn);
        assert_eq!(ExecutionErrorCode::DqExecutionInternal.severity(), Severity::Fatal);
    }

    #[test]
    fn test_storage_error_keeps_source_code() {
        let err = ExecutionError::from(DatastoreError::IndexExists("ix".into()));
        assert_eq!(err.code(), ExecutionErrorCode::DqExecutionStorage);
        assert_eq!(err.source_code(), Some("DQ_INDEX_EXISTS"));
        assert!(err.to_string().contains("Index already exists: ix"));
    }

    #[test]
    fn test_error_display() {
        let err = ExecutionError::failed("fetch input has no id");
        assert_eq!(
            err.to_string(),
            "[ERROR] DQ_EXECUTION_FAILED: fetch input has no id"
        );
    }
}
