//! Invitation and request documents attached to a connection
//!
//! Each connection has at most one invitation record and one request record,
//! tagged with the connection id. Uniqueness is by convention: attaching twice
//! stores two records and the next retrieval reports a duplicate.

use crate::messages::{Invitation, Request};
use crate::record::{ConnRecord, RECORD_ID_NAME, RECORD_TYPE_INVITATION, RECORD_TYPE_REQUEST};
use crate::session::RecordSession;
use crate::storage::{StorageRecord, TagFilter, Tags};
use crate::ConnectionResult;
use tracing::debug;

impl ConnRecord {
    fn attachment_tags(&self, operation: &'static str) -> ConnectionResult<Tags> {
        let id = self.require_id(operation)?;
        Ok(Tags::from([(RECORD_ID_NAME.to_string(), id.to_string())]))
    }

    async fn attach(
        &self,
        session: &RecordSession,
        kind: &str,
        json: String,
        tags: Tags,
    ) -> ConnectionResult<()> {
        let record = StorageRecord::new(kind, json, tags);
        session.storage().add_record(record).await?;
        debug!(connection_id = ?self.connection_id(), kind, "Attached document");
        Ok(())
    }

    async fn find_attached(
        &self,
        session: &RecordSession,
        kind: &str,
        filter: TagFilter,
    ) -> ConnectionResult<String> {
        let record = session.storage().find_record(kind, &filter).await?;
        Ok(record.value)
    }

    /// Persist the invitation this connection was created from
    pub async fn attach_invitation(
        &self,
        session: &RecordSession,
        invitation: impl Into<Invitation>,
    ) -> ConnectionResult<()> {
        let tags = self.attachment_tags("attaching an invitation")?;
        let json = invitation.into().to_json()?;
        self.attach(session, RECORD_TYPE_INVITATION, json, tags).await
    }

    /// Load the attached invitation, decoding the shape named by its `@type`
    pub async fn retrieve_invitation(&self, session: &RecordSession) -> ConnectionResult<Invitation> {
        let filter = self.attachment_tags("retrieving the invitation")?;
        let json = self
            .find_attached(session, RECORD_TYPE_INVITATION, filter)
            .await?;
        Invitation::from_json(&json)
    }

    /// Persist the request this connection was created from
    pub async fn attach_request(
        &self,
        session: &RecordSession,
        request: impl Into<Request>,
    ) -> ConnectionResult<()> {
        let tags = self.attachment_tags("attaching a request")?;
        let json = request.into().to_json()?;
        self.attach(session, RECORD_TYPE_REQUEST, json, tags).await
    }

    /// Load the attached request, decoding the shape named by its `@type`
    pub async fn retrieve_request(&self, session: &RecordSession) -> ConnectionResult<Request> {
        let filter = self.attachment_tags("retrieving the request")?;
        let json = self.find_attached(session, RECORD_TYPE_REQUEST, filter).await?;
        Request::from_json(&json)
    }
}
