//! Tag-indexed record storage
//!
//! Defines the storage collaborator contract the connection record persists
//! through. A record is `{kind, id, value, tags}`: the value is an opaque
//! string, the tags are the only fields a backend indexes for lookup.
//!
//! # Invariants
//!
//! - `find_record` returns exactly one record or fails with `NotFound` /
//!   `Duplicate`; it never picks one of several matches.
//! - `upsert_record` is atomic with respect to other calls on the same backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// In-memory reference backend
pub mod memory;

pub use memory::MemoryRecordStorage;

/// Indexed tag values of a stored record
pub type Tags = BTreeMap<String, String>;

/// Equality filter over record tags; every entry must match
pub type TagFilter = BTreeMap<String, String>;

/// Render a tag filter for error messages and log fields
pub fn describe_filter(filter: &TagFilter) -> String {
    let parts: Vec<String> = filter.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", parts.join(", "))
}

/// A single stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRecord {
    /// Record kind, e.g. `connection` or `connection_metadata`
    pub kind: String,
    /// Unique identifier within the kind
    pub id: String,
    /// Opaque value blob
    pub value: String,
    /// Indexed tags
    pub tags: Tags,
}

impl StorageRecord {
    /// Create a record with a freshly generated identifier
    pub fn new(kind: impl Into<String>, value: impl Into<String>, tags: Tags) -> Self {
        Self::with_id(kind, uuid::Uuid::new_v4().to_string(), value, tags)
    }

    /// Create a record with an explicit identifier
    pub fn with_id(
        kind: impl Into<String>,
        id: impl Into<String>,
        value: impl Into<String>,
        tags: Tags,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            value: value.into(),
            tags,
        }
    }

    /// True when every entry of `filter` is present in this record's tags
    pub fn matches(&self, filter: &TagFilter) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.tags.get(key) == Some(expected))
    }
}

/// Storage error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No record matched
    #[error("Record not found: {kind} matching {filter}")]
    NotFound {
        /// Record kind searched
        kind: String,
        /// Rendered filter or id
        filter: String,
    },
    /// More than one record matched a single-record lookup
    #[error("Duplicate records: {count} {kind} records matching {filter}")]
    Duplicate {
        /// Record kind searched
        kind: String,
        /// Rendered filter
        filter: String,
        /// Number of matches
        count: usize,
    },
    /// A record with the same kind and id already exists
    #[error("Record already exists: {kind}/{id}")]
    Conflict {
        /// Record kind
        kind: String,
        /// Conflicting identifier
        id: String,
    },
    /// Backend-specific failure
    #[error("Storage backend error: {message}")]
    Backend {
        /// Error message from the backend
        message: String,
    },
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(kind: impl Into<String>, filter: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            filter: filter.into(),
        }
    }

    /// Create a duplicate result error
    pub fn duplicate(kind: impl Into<String>, filter: impl Into<String>, count: usize) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            filter: filter.into(),
            count,
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Storage collaborator for tag-indexed records
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Insert a new record; fails with `Conflict` if the id is taken
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError>;

    /// Fetch a record by kind and identifier
    async fn get_record(&self, kind: &str, id: &str) -> Result<StorageRecord, StorageError>;

    /// Fetch every record of `kind` whose tags match `filter`
    async fn find_all_records(
        &self,
        kind: &str,
        filter: &TagFilter,
    ) -> Result<Vec<StorageRecord>, StorageError>;

    /// Fetch the unique record of `kind` whose tags match `filter`
    async fn find_record(
        &self,
        kind: &str,
        filter: &TagFilter,
    ) -> Result<StorageRecord, StorageError> {
        let mut found = self.find_all_records(kind, filter).await?;
        match found.len() {
            0 => Err(StorageError::not_found(kind, describe_filter(filter))),
            1 => Ok(found.remove(0)),
            count => Err(StorageError::duplicate(kind, describe_filter(filter), count)),
        }
    }

    /// Replace the value and tags of an existing record
    async fn update_record(
        &self,
        record: &StorageRecord,
        value: &str,
        tags: Tags,
    ) -> Result<(), StorageError>;

    /// Remove an existing record
    async fn delete_record(&self, record: &StorageRecord) -> Result<(), StorageError>;

    /// Atomically update the unique record of `kind` tagged exactly `tags`,
    /// or insert one when none exists. Returns the stored record.
    async fn upsert_record(
        &self,
        kind: &str,
        value: &str,
        tags: Tags,
    ) -> Result<StorageRecord, StorageError>;
}
