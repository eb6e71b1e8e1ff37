//! Datastore error types
//!
//! Error codes:
//! - DQ_KEYSPACE_NOT_FOUND (WARN)
//! - DQ_INDEX_NOT_FOUND (WARN)
//! - DQ_INDEX_TYPE_UNSUPPORTED (WARN)
//! - DQ_INDEX_EXISTS (WARN)
//! - DQ_INDEX_CREATE_FAILED (ERROR)
//! - DQ_INDEX_SCAN_FAILED (ERROR)
//! - DQ_DATASTORE_INTERNAL (FATAL)

use thiserror::Error;

use crate::observability::Severity;

/// Result type for datastore operations
pub type DatastoreResult<T> = Result<T, DatastoreError>;

/// Datastore errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatastoreError {
    // ==================
    // Resolution Errors
    // ==================
    /// No keyspace with this name in the namespace
    #[error("Keyspace not found: {namespace}:{keyspace}")]
    KeyspaceNotFound { namespace: String, keyspace: String },

    /// No index with this name
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The keyspace has no indexer for this index type
    #[error("Unsupported index type: {0}")]
    UnsupportedIndexType(String),

    // ==================
    // Index Errors
    // ==================
    /// An index with this name already exists
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// Index creation failed
    #[error("Index creation failed: {0}")]
    CreateFailed(String),

    /// Index scan failed
    #[error("Index scan failed: {0}")]
    ScanFailed(String),

    // ==================
    // Internal Errors
    // ==================
    /// Shared state is unusable
    #[error("Internal datastore error: {0}")]
    Internal(String),
}

impl DatastoreError {
    pub fn keyspace_not_found(namespace: impl Into<String>, keyspace: impl Into<String>) -> Self {
        DatastoreError::KeyspaceNotFound {
            namespace: namespace.into(),
            keyspace: keyspace.into(),
        }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DatastoreError::KeyspaceNotFound { .. } => "DQ_KEYSPACE_NOT_FOUND",
            DatastoreError::IndexNotFound(_) => "DQ_INDEX_NOT_FOUND",
            DatastoreError::UnsupportedIndexType(_) => "DQ_INDEX_TYPE_UNSUPPORTED",
            DatastoreError::IndexExists(_) => "DQ_INDEX_EXISTS",
            DatastoreError::CreateFailed(_) => "DQ_INDEX_CREATE_FAILED",
            DatastoreError::ScanFailed(_) => "DQ_INDEX_SCAN_FAILED",
            DatastoreError::Internal(_) => "DQ_DATASTORE_INTERNAL",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            DatastoreError::KeyspaceNotFound { .. }
            | DatastoreError::IndexNotFound(_)
            | DatastoreError::UnsupportedIndexType(_)
            | DatastoreError::IndexExists(_) => Severity::Warn,
            DatastoreError::CreateFailed(_) | DatastoreError::ScanFailed(_) => Severity::Error,
            DatastoreError::Internal(_) => Severity::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DatastoreError::keyspace_not_found("default", "users").code(),
            "DQ_KEYSPACE_NOT_FOUND"
        );
        assert_eq!(DatastoreError::IndexExists("ix".into()).code(), "DQ_INDEX_EXISTS");
        assert_eq!(DatastoreError::Internal("x".into()).severity(), Severity::Fatal);
    }

    #[test]
    fn test_display_names_the_keyspace() {
        let err = DatastoreError::keyspace_not_found("default", "users");
        assert_eq!(err.to_string(), "Keyspace not found: default:users");
    }
}
