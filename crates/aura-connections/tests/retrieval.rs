//! Lookups by DID, invitation key and request id

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_matches::assert_matches;
use aura_connections::record::RECORD_TYPE;
use aura_connections::{
    ConnRecord, ConnectionError, MemoryRecordStorage, PostFilter, RecordSession, RecordStorage,
    Role, State, StorageError, StorageRecord, TagFilter, Tags,
};
use std::sync::Arc;

fn session() -> (RecordSession, MemoryRecordStorage) {
    let storage = MemoryRecordStorage::new();
    (RecordSession::new(Arc::new(storage.clone())), storage)
}

async fn saved(session: &RecordSession, record: ConnRecord) -> ConnRecord {
    let mut record = record;
    record.save(session, None).await.unwrap();
    record
}

#[tokio::test]
async fn test_retrieve_by_did_pair() {
    let (session, _) = session();
    let target = saved(
        &session,
        ConnRecord::builder()
            .my_did("mine-1")
            .their_did("theirs-1")
            .their_role("requester")
            .state("completed")
            .build(),
    )
    .await;
    saved(
        &session,
        ConnRecord::builder()
            .my_did("mine-2")
            .their_did("theirs-1")
            .build(),
    )
    .await;

    let found = ConnRecord::retrieve_by_did(&session, Some("theirs-1"), Some("mine-1"), None)
        .await
        .unwrap();
    assert_eq!(found.connection_id(), target.connection_id());

    // Role accepted under either vocabulary once resolved
    let role = Role::get("invitee");
    let found = ConnRecord::retrieve_by_did(&session, Some("theirs-1"), Some("mine-1"), role)
        .await
        .unwrap();
    assert_eq!(found, target);
}

#[tokio::test]
async fn test_retrieve_by_did_role_mismatch_is_not_found() {
    let (session, _) = session();
    saved(
        &session,
        ConnRecord::builder()
            .my_did("mine")
            .their_did("theirs")
            .their_role(Role::Requester)
            .build(),
    )
    .await;

    let err = ConnRecord::retrieve_by_did(
        &session,
        Some("theirs"),
        Some("mine"),
        Some(Role::Responder),
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_retrieve_by_did_omits_absent_dids() {
    let (session, _) = session();
    let only = saved(&session, ConnRecord::builder().their_did("theirs").build()).await;

    let found = ConnRecord::retrieve_by_did(&session, Some("theirs"), None, None)
        .await
        .unwrap();
    assert_eq!(found, only);

    saved(&session, ConnRecord::builder().their_did("theirs").build()).await;
    let err = ConnRecord::retrieve_by_did(&session, Some("theirs"), None, None)
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
}

#[tokio::test]
async fn test_retrieve_by_invitation_key_requires_invitation_state() {
    let (session, _) = session();
    let mut record = saved(
        &session,
        ConnRecord::builder()
            .invitation_key("8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K")
            .their_role(Role::Requester)
            .state(State::Invitation)
            .build(),
    )
    .await;

    let found = ConnRecord::retrieve_by_invitation_key(
        &session,
        "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K",
        Some(Role::Requester),
    )
    .await
    .unwrap();
    assert_eq!(found, record);

    let err = ConnRecord::retrieve_by_invitation_key(
        &session,
        "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K",
        Some(Role::Responder),
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found());

    record.state = State::Request;
    record.save(&session, Some("request received")).await.unwrap();
    let err = ConnRecord::retrieve_by_invitation_key(
        &session,
        "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K",
        None,
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_retrieve_by_request_id() {
    let (session, storage) = session();
    let record = saved(&session, ConnRecord::builder().request_id("req-1").build()).await;

    let found = ConnRecord::retrieve_by_request_id(&session, "req-1")
        .await
        .unwrap();
    assert_eq!(found, record);

    let err = ConnRecord::retrieve_by_request_id(&session, "req-unknown")
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ConnectionError::Storage(StorageError::NotFound { ref filter, .. })
            if filter.contains("req-unknown")
    );

    // A second record carrying the same request id written around the record API
    storage
        .add_record(StorageRecord::new(
            RECORD_TYPE,
            "{}",
            Tags::from([("request_id".to_string(), "req-1".to_string())]),
        ))
        .await
        .unwrap();
    let err = ConnRecord::retrieve_by_request_id(&session, "req-1")
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ConnectionError::Storage(StorageError::Duplicate { count: 2, .. })
    );
}

#[tokio::test]
async fn test_query_applies_post_filter_after_tags() {
    let (session, _) = session();
    for state in [State::Invitation, State::Completed, State::Completed] {
        saved(
            &session,
            ConnRecord::builder()
                .my_did("shared")
                .state(state)
                .build(),
        )
        .await;
    }
    saved(&session, ConnRecord::builder().my_did("other").build()).await;

    let tag_filter = TagFilter::from([("my_did".to_string(), "shared".to_string())]);
    let all = ConnRecord::query(&session, &tag_filter, &PostFilter::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let active = PostFilter::from([("state".to_string(), "active".to_string())]);
    let completed = ConnRecord::query(&session, &tag_filter, &active)
        .await
        .unwrap();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().all(|r| r.state == "completed"));
}
