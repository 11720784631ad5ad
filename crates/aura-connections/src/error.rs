//! Connection error types
//!
//! Storage failures surface unchanged through [`ConnectionError::Storage`];
//! callers match on the inner [`StorageError`] to tell "no record" apart from
//! "more than one record".

use crate::storage::StorageError;

/// Errors raised by connection record operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Failure reported by the storage collaborator
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Operation requires a saved record but the record has no identifier
    #[error("Connection record has no identifier; save it before {operation}")]
    MissingConnectionId {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Stored document carries a type discriminator outside the dispatch table
    #[error("Unrecognized message type: {message_type}")]
    UnknownMessageType {
        /// Unqualified `@type` value that failed to match
        message_type: String,
    },

    /// Stored document has no `@type` field
    #[error("Stored document is missing the @type discriminator")]
    MissingMessageType,

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache collaborator failed
    #[error("Cache error: {message}")]
    Cache {
        /// Error message from the cache
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl ConnectionError {
    /// Create a missing identifier error for the named operation
    pub fn missing_id(operation: &'static str) -> Self {
        Self::MissingConnectionId { operation }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True when the storage layer found no matching record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }

    /// True when the storage layer found more than one matching record
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Duplicate { .. }))
    }
}

/// Result type for connection record operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_pass_through() {
        let err: ConnectionError = StorageError::not_found("connection", "{}").into();
        assert!(err.is_not_found());
        assert!(!err.is_duplicate());
        assert_eq!(
            err.to_string(),
            "Record not found: connection matching {}"
        );
    }

    #[test]
    fn test_missing_id_message() {
        let err = ConnectionError::missing_id("attaching an invitation");
        assert_eq!(
            err.to_string(),
            "Connection record has no identifier; save it before attaching an invitation"
        );
    }
}
