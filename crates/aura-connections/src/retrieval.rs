//! Connection lookups by partial identity
//!
//! Only tag fields can be filtered by storage. State and role live in the
//! value blob, so those conditions are applied after candidates are fetched.
//! Single-record lookups fail on zero and on several matches; choosing among
//! duplicates is left to the caller.

use crate::labels::{Role, State};
use crate::record::{ConnRecord, RECORD_TYPE};
use crate::session::RecordSession;
use crate::storage::{describe_filter, StorageError, TagFilter};
use crate::ConnectionResult;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Exact-match conditions on value blob fields, compared as strings
pub type PostFilter = BTreeMap<String, String>;

fn post_filter_matches(record: &ConnRecord, post_filter: &PostFilter) -> bool {
    if post_filter.is_empty() {
        return true;
    }
    let value = record.record_value();
    post_filter
        .iter()
        .all(|(field, expected)| matches!(value.get(field), Some(Value::String(s)) if s == expected))
}

fn describe(tag_filter: &TagFilter, post_filter: &PostFilter) -> String {
    if post_filter.is_empty() {
        describe_filter(tag_filter)
    } else {
        format!(
            "{} where {}",
            describe_filter(tag_filter),
            describe_filter(post_filter)
        )
    }
}

impl ConnRecord {
    /// Every record matching `tag_filter` in storage and `post_filter` in memory
    pub async fn query(
        session: &RecordSession,
        tag_filter: &TagFilter,
        post_filter: &PostFilter,
    ) -> ConnectionResult<Vec<Self>> {
        let candidates = session
            .storage()
            .find_all_records(RECORD_TYPE, tag_filter)
            .await?;

        let mut matched = Vec::new();
        for stored in &candidates {
            let record = Self::from_storage_record(stored)?;
            if post_filter_matches(&record, post_filter) {
                matched.push(record);
            }
        }
        debug!(
            candidates = candidates.len(),
            matched = matched.len(),
            filter = %describe(tag_filter, post_filter),
            "Connection query"
        );
        Ok(matched)
    }

    /// The single record matching both filters
    pub async fn retrieve_by_tag_filter(
        session: &RecordSession,
        tag_filter: &TagFilter,
        post_filter: &PostFilter,
    ) -> ConnectionResult<Self> {
        let mut matched = Self::query(session, tag_filter, post_filter).await?;
        match matched.len() {
            0 => Err(StorageError::not_found(RECORD_TYPE, describe(tag_filter, post_filter)).into()),
            1 => Ok(matched.remove(0)),
            count => Err(StorageError::duplicate(
                RECORD_TYPE,
                describe(tag_filter, post_filter),
                count,
            )
            .into()),
        }
    }

    /// Retrieve by their DID and/or our DID, optionally restricted to their role.
    /// DIDs not supplied are left out of the filter.
    #[instrument(skip(session))]
    pub async fn retrieve_by_did(
        session: &RecordSession,
        their_did: Option<&str>,
        my_did: Option<&str>,
        their_role: Option<Role>,
    ) -> ConnectionResult<Self> {
        let mut tag_filter = TagFilter::new();
        if let Some(did) = their_did {
            tag_filter.insert("their_did".into(), did.into());
        }
        if let Some(did) = my_did {
            tag_filter.insert("my_did".into(), did.into());
        }

        let mut post_filter = PostFilter::new();
        if let Some(role) = their_role {
            post_filter.insert("their_role".into(), role.rfc160().into());
        }

        Self::retrieve_by_tag_filter(session, &tag_filter, &post_filter).await
    }

    /// Retrieve the connection still in invitation state for an invitation key
    #[instrument(skip(session))]
    pub async fn retrieve_by_invitation_key(
        session: &RecordSession,
        invitation_key: &str,
        their_role: Option<Role>,
    ) -> ConnectionResult<Self> {
        let tag_filter = TagFilter::from([("invitation_key".into(), invitation_key.into())]);

        let mut post_filter =
            PostFilter::from([("state".into(), State::Invitation.rfc160().into())]);
        if let Some(role) = their_role {
            post_filter.insert("their_role".into(), role.rfc160().into());
        }

        Self::retrieve_by_tag_filter(session, &tag_filter, &post_filter).await
    }

    /// Retrieve the connection created from one of our requests
    #[instrument(skip(session))]
    pub async fn retrieve_by_request_id(
        session: &RecordSession,
        request_id: &str,
    ) -> ConnectionResult<Self> {
        let tag_filter = TagFilter::from([("request_id".into(), request_id.into())]);
        Self::retrieve_by_tag_filter(session, &tag_filter, &PostFilter::new()).await
    }
}
