//! In-memory record storage

use super::{describe_filter, RecordStorage, StorageError, StorageRecord, TagFilter, Tags};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type RecordKey = (String, String);

/// In-memory record storage keyed by `(kind, id)`
///
/// Tag uniqueness is not enforced: two records may carry identical tags, in
/// which case `find_record` reports `Duplicate`.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStorage {
    records: Arc<RwLock<BTreeMap<RecordKey, StorageRecord>>>,
}

impl MemoryRecordStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records of `kind`
    pub async fn count(&self, kind: &str) -> usize {
        let records = self.records.read().await;
        records.keys().filter(|(k, _)| k == kind).count()
    }

    /// All stored records (for testing)
    pub async fn snapshot(&self) -> Vec<StorageRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStorage for MemoryRecordStorage {
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        let key = (record.kind.clone(), record.id.clone());
        if records.contains_key(&key) {
            return Err(StorageError::Conflict {
                kind: record.kind,
                id: record.id,
            });
        }
        records.insert(key, record);
        Ok(())
    }

    async fn get_record(&self, kind: &str, id: &str) -> Result<StorageRecord, StorageError> {
        let records = self.records.read().await;
        records
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(kind, format!("{{id={id}}}")))
    }

    async fn find_all_records(
        &self,
        kind: &str,
        filter: &TagFilter,
    ) -> Result<Vec<StorageRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.kind == kind && r.matches(filter))
            .cloned()
            .collect())
    }

    async fn update_record(
        &self,
        record: &StorageRecord,
        value: &str,
        tags: Tags,
    ) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&(record.kind.clone(), record.id.clone()))
            .ok_or_else(|| {
                StorageError::not_found(record.kind.clone(), format!("{{id={}}}", record.id))
            })?;
        stored.value = value.to_string();
        stored.tags = tags;
        Ok(())
    }

    async fn delete_record(&self, record: &StorageRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records
            .remove(&(record.kind.clone(), record.id.clone()))
            .map(|_| ())
            .ok_or_else(|| {
                StorageError::not_found(record.kind.clone(), format!("{{id={}}}", record.id))
            })
    }

    async fn upsert_record(
        &self,
        kind: &str,
        value: &str,
        tags: Tags,
    ) -> Result<StorageRecord, StorageError> {
        // Held across lookup and write so concurrent upserts serialize
        let mut records = self.records.write().await;
        let count = records
            .values()
            .filter(|r| r.kind == kind && r.matches(&tags))
            .count();
        if count > 1 {
            return Err(StorageError::duplicate(kind, describe_filter(&tags), count));
        }

        if let Some(stored) = records
            .values_mut()
            .find(|r| r.kind == kind && r.matches(&tags))
        {
            stored.value = value.to_string();
            return Ok(stored.clone());
        }

        let record = StorageRecord::new(kind, value, tags);
        records.insert((record.kind.clone(), record.id.clone()), record.clone());
        Ok(record)
    }
}
