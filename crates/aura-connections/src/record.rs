//! The pairwise connection record
//!
//! `my_did`, `their_did`, `request_id` and `invitation_key` are stored as
//! tags, the only fields the storage backend can filter on. Everything else
//! lives in the JSON value blob, with `state` and `their_role` written as
//! their RFC 160 labels.

use crate::labels::{LabelQuery, Role, State};
use crate::modes::{AcceptMode, InvitationMode, RoutingState};
use crate::session::RecordSession;
use crate::storage::{StorageError, StorageRecord, Tags};
use crate::{ConnectionError, ConnectionResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info, instrument};

/// Storage kind of connection records
pub const RECORD_TYPE: &str = "connection";
/// Storage kind of attached invitations
pub const RECORD_TYPE_INVITATION: &str = "connection_invitation";
/// Storage kind of attached requests
pub const RECORD_TYPE_REQUEST: &str = "connection_request";
/// Storage kind of connection metadata entries
pub const RECORD_TYPE_METADATA: &str = "connection_metadata";

/// Tag naming the owning connection on attached records
pub const RECORD_ID_NAME: &str = "connection_id";

/// Fields stored as indexed tags
pub const TAG_NAMES: [&str; 4] = ["my_did", "their_did", "request_id", "invitation_key"];

/// Prefix of the connection target cache key cleared on every save
pub const CACHE_KEY_PREFIX: &str = "connection_target::";

/// Identifier of a stored connection record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single pairwise connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnRecord {
    pub(crate) connection_id: Option<ConnectionId>,
    /// Our DID for the connection
    pub my_did: Option<String>,
    /// Their DID for the connection
    pub their_did: Option<String>,
    /// Their display label
    pub their_label: Option<String>,
    /// Their role in the connection protocol
    pub their_role: Option<Role>,
    /// Public key of the originating invitation
    pub invitation_key: Option<String>,
    /// Identifier of the originating request
    pub request_id: Option<String>,
    /// Connection state
    pub state: State,
    /// Inbound routing connection to use
    pub inbound_connection_id: Option<String>,
    /// Last error message
    pub error_msg: Option<String>,
    /// Mediation routing state
    pub routing_state: RoutingState,
    /// Acceptance policy
    pub accept: AcceptMode,
    /// Invitation reuse policy
    pub invitation_mode: InvitationMode,
    /// Local alias
    pub alias: Option<String>,
    /// First save time (RFC 3339)
    pub created_at: Option<String>,
    /// Last save time (RFC 3339)
    pub updated_at: Option<String>,
}

impl Default for ConnRecord {
    fn default() -> Self {
        ConnRecordBuilder::default().build()
    }
}

/// Builder taking an optional value for every connection attribute
#[derive(Debug, Clone, Default)]
pub struct ConnRecordBuilder {
    connection_id: Option<ConnectionId>,
    my_did: Option<String>,
    their_did: Option<String>,
    their_label: Option<String>,
    their_role: Option<Role>,
    invitation_key: Option<String>,
    request_id: Option<String>,
    state: Option<State>,
    inbound_connection_id: Option<String>,
    error_msg: Option<String>,
    routing_state: Option<RoutingState>,
    accept: Option<AcceptMode>,
    invitation_mode: Option<InvitationMode>,
    alias: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl ConnRecordBuilder {
    /// Identifier of an already stored record
    pub fn connection_id(mut self, id: impl Into<ConnectionId>) -> Self {
        self.connection_id = Some(id.into());
        self
    }

    /// Our DID
    pub fn my_did(mut self, did: impl Into<String>) -> Self {
        self.my_did = Some(did.into());
        self
    }

    /// Their DID
    pub fn their_did(mut self, did: impl Into<String>) -> Self {
        self.their_did = Some(did.into());
        self
    }

    /// Their display label
    pub fn their_label(mut self, label: impl Into<String>) -> Self {
        self.their_label = Some(label.into());
        self
    }

    /// Their role, as a variant or under either label; unknown labels leave it unset
    pub fn their_role(mut self, role: impl LabelQuery<Role>) -> Self {
        self.their_role = Role::get(role);
        self
    }

    /// Public key of the originating invitation
    pub fn invitation_key(mut self, key: impl Into<String>) -> Self {
        self.invitation_key = Some(key.into());
        self
    }

    /// Identifier of the originating request
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// State, as a variant or under either label; unknown labels fall back to init
    pub fn state(mut self, state: impl LabelQuery<State>) -> Self {
        self.state = State::get(state);
        self
    }

    /// Inbound routing connection
    pub fn inbound_connection_id(mut self, id: impl Into<String>) -> Self {
        self.inbound_connection_id = Some(id.into());
        self
    }

    /// Last error message
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Mediation routing state
    pub fn routing_state(mut self, routing_state: RoutingState) -> Self {
        self.routing_state = Some(routing_state);
        self
    }

    /// Acceptance policy
    pub fn accept(mut self, accept: AcceptMode) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Invitation reuse policy
    pub fn invitation_mode(mut self, mode: InvitationMode) -> Self {
        self.invitation_mode = Some(mode);
        self
    }

    /// Local alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Normalize and produce the record
    pub fn build(self) -> ConnRecord {
        ConnRecord {
            connection_id: self.connection_id,
            my_did: self.my_did,
            their_did: self.their_did,
            their_label: self.their_label,
            their_role: self.their_role,
            invitation_key: self.invitation_key,
            request_id: self.request_id,
            state: self.state.unwrap_or(State::Init),
            inbound_connection_id: self.inbound_connection_id,
            error_msg: self.error_msg,
            routing_state: self.routing_state.unwrap_or(RoutingState::DEFAULT),
            accept: self.accept.unwrap_or(AcceptMode::DEFAULT),
            invitation_mode: self.invitation_mode.unwrap_or(InvitationMode::DEFAULT),
            alias: self.alias,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Value blob as persisted; labels stay strings so stored records written
/// under either vocabulary load through the same normalization as the builder
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredValue {
    their_role: Option<String>,
    inbound_connection_id: Option<String>,
    routing_state: Option<String>,
    accept: Option<String>,
    invitation_mode: Option<String>,
    alias: Option<String>,
    error_msg: Option<String>,
    their_label: Option<String>,
    state: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl ConnRecord {
    /// Start building a record
    pub fn builder() -> ConnRecordBuilder {
        ConnRecordBuilder::default()
    }

    /// Identifier, once assigned
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// Identifier, or `MissingConnectionId` naming `operation`
    pub(crate) fn require_id(&self, operation: &'static str) -> ConnectionResult<&ConnectionId> {
        self.connection_id
            .as_ref()
            .ok_or_else(|| ConnectionError::missing_id(operation))
    }

    /// Connection is ready to carry messages
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Response | State::Completed)
    }

    /// Connection was created from a multi-use invitation
    pub fn is_multiuse_invitation(&self) -> bool {
        self.invitation_mode == InvitationMode::Multi
    }

    /// Non-tag fields, as stored in the value blob
    pub fn record_value(&self) -> Map<String, Value> {
        let mut value = Map::new();
        value.insert(
            "their_role".into(),
            Value::from(self.their_role.map(Role::rfc160)),
        );
        value.insert(
            "inbound_connection_id".into(),
            Value::from(self.inbound_connection_id.clone()),
        );
        value.insert(
            "routing_state".into(),
            Value::from(self.routing_state.as_str()),
        );
        value.insert("accept".into(), Value::from(self.accept.as_str()));
        value.insert(
            "invitation_mode".into(),
            Value::from(self.invitation_mode.as_str()),
        );
        value.insert("alias".into(), Value::from(self.alias.clone()));
        value.insert("error_msg".into(), Value::from(self.error_msg.clone()));
        value.insert("their_label".into(), Value::from(self.their_label.clone()));
        value.insert("state".into(), Value::from(self.state.rfc160()));
        value.insert("created_at".into(), Value::from(self.created_at.clone()));
        value.insert("updated_at".into(), Value::from(self.updated_at.clone()));
        value
    }

    /// Tag fields that are set
    pub fn tags(&self) -> Tags {
        [
            ("my_did", &self.my_did),
            ("their_did", &self.their_did),
            ("request_id", &self.request_id),
            ("invitation_key", &self.invitation_key),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name.to_string(), v)))
        .collect()
    }

    /// Cache key cleared after every save
    pub fn cache_key(id: &ConnectionId) -> String {
        format!("{CACHE_KEY_PREFIX}{id}")
    }

    fn storage_record(&self, id: &ConnectionId) -> ConnectionResult<StorageRecord> {
        let value = serde_json::to_string(&Value::Object(self.record_value()))?;
        Ok(StorageRecord::with_id(
            RECORD_TYPE,
            id.as_str(),
            value,
            self.tags(),
        ))
    }

    /// Rebuild a record from its stored form
    pub fn from_storage_record(record: &StorageRecord) -> ConnectionResult<Self> {
        let stored: StoredValue = serde_json::from_str(&record.value)?;
        let tag = |name: &str| record.tags.get(name).cloned();

        let builder = ConnRecordBuilder {
            connection_id: Some(ConnectionId::new(record.id.clone())),
            my_did: tag("my_did"),
            their_did: tag("their_did"),
            their_label: stored.their_label,
            their_role: stored.their_role.as_deref().and_then(Role::from_label),
            invitation_key: tag("invitation_key"),
            request_id: tag("request_id"),
            state: stored.state.as_deref().and_then(State::from_label),
            inbound_connection_id: stored.inbound_connection_id,
            error_msg: stored.error_msg,
            routing_state: stored.routing_state.and_then(|s| s.parse().ok()),
            accept: stored.accept.and_then(|s| s.parse().ok()),
            invitation_mode: stored.invitation_mode.and_then(|s| s.parse().ok()),
            alias: stored.alias,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        };
        Ok(builder.build())
    }

    /// Persist the record, assigning an identifier on first save, then run
    /// the post-save hook
    #[instrument(skip(self, session), fields(state = %self.state))]
    pub async fn save(
        &mut self,
        session: &RecordSession,
        reason: Option<&str>,
    ) -> ConnectionResult<ConnectionId> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let id = self
            .connection_id
            .clone()
            .unwrap_or_else(ConnectionId::generate);

        // Timestamps and id land on `self` only once the write succeeds
        let staged = ConnRecord {
            connection_id: Some(id.clone()),
            created_at: Some(self.created_at.clone().unwrap_or_else(|| now.clone())),
            updated_at: Some(now),
            ..self.clone()
        };
        let record = staged.storage_record(&id)?;
        let storage = session.storage();

        let updated = storage
            .update_record(&record, &record.value, record.tags.clone())
            .await;
        let created = match updated {
            Ok(()) => false,
            Err(StorageError::NotFound { .. }) => {
                storage.add_record(record).await?;
                true
            }
            Err(err) => return Err(err.into()),
        };
        *self = staged;

        if session.config().log_state {
            info!(
                connection_id = %id,
                state = %self.state,
                their_role = ?self.their_role.map(Role::rfc160),
                reason = reason.unwrap_or(""),
                created,
                "Connection record saved"
            );
        } else {
            debug!(connection_id = %id, created, "Connection record saved");
        }

        self.post_save(session).await?;
        Ok(id)
    }

    /// Runs after every successful save: drop the cached connection target
    pub async fn post_save(&self, session: &RecordSession) -> ConnectionResult<()> {
        let id = self.require_id("running post-save actions")?;
        session.clear_cached_key(&Self::cache_key(id)).await
    }

    /// Fetch a record by identifier
    pub async fn retrieve_by_id(
        session: &RecordSession,
        connection_id: &ConnectionId,
    ) -> ConnectionResult<Self> {
        let record = session
            .storage()
            .get_record(RECORD_TYPE, connection_id.as_str())
            .await?;
        Self::from_storage_record(&record)
    }

    /// Remove the stored record
    pub async fn delete_record(&self, session: &RecordSession) -> ConnectionResult<()> {
        let id = self.require_id("deleting the record")?;
        let record = self.storage_record(id)?;
        session.storage().delete_record(&record).await?;
        debug!(connection_id = %id, "Connection record deleted");
        Ok(())
    }
}
