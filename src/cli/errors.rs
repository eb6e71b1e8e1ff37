//! CLI-specific error types
//!
//! Errors from the core subsystems keep their own code as the cause.

use std::fmt;
use std::io;

use crate::execution::ExecutionError;
use crate::expr::ExprError;
use crate::plan::PlanError;
use crate::planner::PlannerError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, files)
    IoError,
    /// Malformed command-line argument
    InvalidArgument,
    /// Query could not be planned
    PlanFailed,
    /// Query failed while running
    QueryFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DQ_CLI_CONFIG_ERROR",
            Self::IoError => "DQ_CLI_IO_ERROR",
            Self::InvalidArgument => "DQ_CLI_INVALID_ARGUMENT",
            Self::PlanFailed => "DQ_CLI_PLAN_FAILED",
            Self::QueryFailed => "DQ_CLI_QUERY_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
    cause: Option<&'static str>,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    fn with_cause(mut self, cause: &'static str) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Bad argument value
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Code of the subsystem error behind this one
    pub fn cause(&self) -> Option<&'static str> {
        self.cause
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ExprError> for CliError {
    fn from(e: ExprError) -> Self {
        Self::invalid_argument(e.to_string()).with_cause(e.code())
    }
}

impl From<PlannerError> for CliError {
    fn from(e: PlannerError) -> Self {
        let cause = e.cause().unwrap_or(e.code().code());
        Self::new(CliErrorCode::PlanFailed, e.message()).with_cause(cause)
    }
}

impl From<PlanError> for CliError {
    fn from(e: PlanError) -> Self {
        Self::new(CliErrorCode::PlanFailed, e.to_string()).with_cause(e.code())
    }
}

impl From<ExecutionError> for CliError {
    fn from(e: ExecutionError) -> Self {
        let cause = e.source_code().unwrap_or(e.code().code());
        Self::new(CliErrorCode::QueryFailed, e.message()).with_cause(cause)
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::DatastoreError;

    #[test]
    fn test_planner_error_keeps_cause() {
        let err = CliError::from(PlannerError::unresolved(&DatastoreError::keyspace_not_found(
            "default", "nope",
        )));
        assert_eq!(err.code(), &CliErrorCode::PlanFailed);
        assert_eq!(err.cause(), Some("DQ_KEYSPACE_NOT_FOUND"));
    }

    #[test]
    fn test_display() {
        let err = CliError::config_error("channel_capacity must be > 0");
        assert_eq!(err.to_string(), "DQ_CLI_CONFIG_ERROR: channel_capacity must be > 0");
        assert_eq!(err.cause(), None);
    }
}
