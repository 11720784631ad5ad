//! Arbitrary key/value metadata on a connection
//!
//! Entries are records of kind `connection_metadata` tagged
//! `{key, connection_id}`. Writes go through the storage backend's atomic
//! upsert so concurrent writers of one key cannot create duplicate entries.

use crate::record::{ConnRecord, RECORD_ID_NAME, RECORD_TYPE_METADATA};
use crate::session::RecordSession;
use crate::storage::{StorageError, Tags};
use crate::ConnectionResult;
use tracing::{debug, instrument};

impl ConnRecord {
    fn metadata_tags(&self, key: &str, operation: &'static str) -> ConnectionResult<Tags> {
        let id = self.require_id(operation)?;
        Ok(Tags::from([
            ("key".to_string(), key.to_string()),
            (RECORD_ID_NAME.to_string(), id.to_string()),
        ]))
    }

    /// Value stored under `key`, or `default` when there is none
    #[instrument(skip(self, session), fields(connection_id = ?self.connection_id()))]
    pub async fn metadata_get(
        &self,
        session: &RecordSession,
        key: &str,
        default: Option<&str>,
    ) -> ConnectionResult<Option<String>> {
        let tags = self.metadata_tags(key, "reading metadata")?;
        match session
            .storage()
            .find_record(RECORD_TYPE_METADATA, &tags)
            .await
        {
            Ok(record) => Ok(Some(record.value)),
            Err(StorageError::NotFound { .. }) => Ok(default.map(str::to_string)),
            Err(err) => Err(err.into()),
        }
    }

    /// Store `value` under `key`, replacing any existing value
    #[instrument(skip(self, session, value), fields(connection_id = ?self.connection_id()))]
    pub async fn metadata_set(
        &self,
        session: &RecordSession,
        key: &str,
        value: &str,
    ) -> ConnectionResult<()> {
        let tags = self.metadata_tags(key, "writing metadata")?;
        let record = session
            .storage()
            .upsert_record(RECORD_TYPE_METADATA, value, tags)
            .await?;
        debug!(record_id = %record.id, "Connection metadata stored");
        Ok(())
    }
}
