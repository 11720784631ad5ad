//! Attached invitation/request documents and per-connection metadata

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_matches::assert_matches;
use aura_connections::record::{RECORD_TYPE_INVITATION, RECORD_TYPE_METADATA};
use aura_connections::{
    ConnRecord, ConnectionError, ConnectionInvitation, ConnectionRequest, DidCommPrefix,
    DidExchangeRequest, Invitation, MemoryRecordStorage, OobInvitation, RecordSession,
    RecordStorage, Request, StorageError, StorageRecord, Tags,
};
use serde_json::json;
use std::sync::Arc;

async fn saved_record() -> (RecordSession, MemoryRecordStorage, ConnRecord) {
    let storage = MemoryRecordStorage::new();
    let session = RecordSession::new(Arc::new(storage.clone()));
    let mut record = ConnRecord::builder().their_label("Faber").build();
    record.save(&session, None).await.unwrap();
    (session, storage, record)
}

#[tokio::test]
async fn test_connection_invitation_round_trip() {
    let (session, _, record) = saved_record().await;
    let invitation = ConnectionInvitation::new(
        DidCommPrefix::Old,
        "Faber",
        vec!["8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K".to_string()],
        "http://faber.example:8020",
    );

    record
        .attach_invitation(&session, invitation.clone())
        .await
        .unwrap();
    let loaded = record.retrieve_invitation(&session).await.unwrap();
    assert_eq!(loaded, Invitation::Connection(invitation));
}

#[tokio::test]
async fn test_oob_invitation_round_trip() {
    let (session, _, record) = saved_record().await;
    let invitation = OobInvitation::new(
        DidCommPrefix::New,
        "Faber",
        vec![DidCommPrefix::New.qualify("didexchange/1.0")],
        vec![json!("did:sov:LjgpST2rjsoxYegQDRm7EL")],
    );

    record
        .attach_invitation(&session, invitation.clone())
        .await
        .unwrap();
    let loaded = record.retrieve_invitation(&session).await.unwrap();
    assert_eq!(loaded, Invitation::OutOfBand(invitation));
}

#[tokio::test]
async fn test_stored_oob_1_0_invitation_is_decoded() {
    let (session, storage, record) = saved_record().await;
    let id = record.connection_id().unwrap().to_string();
    let stored = json!({
        "@type": "https://didcomm.org/out-of-band/1.0/invitation",
        "@id": "69212a3a-d068-4f9d-a2dd-4741bca89af3",
        "label": "Faber College",
        "handshake_protocols": ["https://didcomm.org/didexchange/1.0"],
        "services": [{
            "id": "#inline",
            "type": "did-communication",
            "recipientKeys": ["did:key:z6MkpTHR8VNsBxYAAWHut2Geadd9jSwuBV8xRoAnwWsdvktH"],
            "serviceEndpoint": "http://faber.example:8020"
        }]
    });
    storage
        .add_record(StorageRecord::new(
            RECORD_TYPE_INVITATION,
            stored.to_string(),
            Tags::from([("connection_id".to_string(), id)]),
        ))
        .await
        .unwrap();

    let loaded = record.retrieve_invitation(&session).await.unwrap();
    assert_matches!(loaded, Invitation::OutOfBand(ref oob) => {
        assert_eq!(oob.label.as_deref(), Some("Faber College"));
        assert_eq!(oob.handshake_protocols, vec!["https://didcomm.org/didexchange/1.0"]);
        assert_eq!(oob.services.len(), 1);
        assert_eq!(oob.services[0]["serviceEndpoint"], "http://faber.example:8020");
    });
}

#[tokio::test]
async fn test_request_round_trip_both_shapes() {
    let (session, _, record) = saved_record().await;
    let request = DidExchangeRequest::new(
        DidCommPrefix::New,
        "Alice",
        "did:sov:4fUDR9R7fjwELRvH9JT6HH",
        Some("invitation-1".to_string()),
    );
    record.attach_request(&session, request.clone()).await.unwrap();
    assert_eq!(
        record.retrieve_request(&session).await.unwrap(),
        Request::DidExchange(request)
    );

    let (session, _, record) = saved_record().await;
    let request = ConnectionRequest::new(DidCommPrefix::Old, "Alice", "4fUDR9R7fjwELRvH9JT6HH", None);
    record.attach_request(&session, request.clone()).await.unwrap();
    assert_eq!(
        record.retrieve_request(&session).await.unwrap(),
        Request::Connection(request)
    );
}

#[tokio::test]
async fn test_attachments_are_scoped_to_their_connection() {
    let (session, _, first) = saved_record().await;
    let mut second = ConnRecord::default();
    second.save(&session, None).await.unwrap();

    let invitation = ConnectionInvitation::with_public_did(
        DidCommPrefix::New,
        "Faber",
        "did:sov:LjgpST2rjsoxYegQDRm7EL",
    );
    first.attach_invitation(&session, invitation).await.unwrap();

    let err = second.retrieve_invitation(&session).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(second.retrieve_request(&session).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_attaching_twice_is_duplicate_on_retrieve() {
    let (session, storage, record) = saved_record().await;
    let invitation =
        ConnectionInvitation::with_public_did(DidCommPrefix::New, "Faber", "did:sov:x");
    record
        .attach_invitation(&session, invitation.clone())
        .await
        .unwrap();
    record.attach_invitation(&session, invitation).await.unwrap();
    assert_eq!(storage.count(RECORD_TYPE_INVITATION).await, 2);

    let err = record.retrieve_invitation(&session).await.unwrap_err();
    assert!(err.is_duplicate());
}

#[tokio::test]
async fn test_stored_invitation_with_unknown_type_is_rejected() {
    let (session, storage, record) = saved_record().await;
    let id = record.connection_id().unwrap().to_string();
    storage
        .add_record(StorageRecord::new(
            RECORD_TYPE_INVITATION,
            json!({"@type": "https://didcomm.org/present-proof/1.0/request-presentation", "@id": "x"})
                .to_string(),
            Tags::from([("connection_id".to_string(), id)]),
        ))
        .await
        .unwrap();

    assert_matches!(
        record.retrieve_invitation(&session).await,
        Err(ConnectionError::UnknownMessageType { ref message_type })
            if message_type == "present-proof/1.0/request-presentation"
    );
}

#[tokio::test]
async fn test_unsaved_record_cannot_attach() {
    let session = RecordSession::new(Arc::new(MemoryRecordStorage::new()));
    let record = ConnRecord::default();
    let invitation =
        ConnectionInvitation::with_public_did(DidCommPrefix::New, "Faber", "did:sov:x");

    assert_matches!(
        record.attach_invitation(&session, invitation).await,
        Err(ConnectionError::MissingConnectionId { .. })
    );
    assert_matches!(
        record.retrieve_request(&session).await,
        Err(ConnectionError::MissingConnectionId { .. })
    );
    assert_matches!(
        record.metadata_get(&session, "key", None).await,
        Err(ConnectionError::MissingConnectionId { .. })
    );
    assert_matches!(
        record.metadata_set(&session, "key", "value").await,
        Err(ConnectionError::MissingConnectionId { .. })
    );
}

#[tokio::test]
async fn test_metadata_default_then_upsert() {
    let (session, storage, record) = saved_record().await;

    assert_eq!(record.metadata_get(&session, "endpoint", None).await.unwrap(), None);
    assert_eq!(
        record
            .metadata_get(&session, "endpoint", Some("fallback"))
            .await
            .unwrap()
            .as_deref(),
        Some("fallback")
    );

    record
        .metadata_set(&session, "endpoint", "http://one.example")
        .await
        .unwrap();
    record
        .metadata_set(&session, "endpoint", "http://two.example")
        .await
        .unwrap();
    assert_eq!(storage.count(RECORD_TYPE_METADATA).await, 1);
    assert_eq!(
        record
            .metadata_get(&session, "endpoint", Some("fallback"))
            .await
            .unwrap()
            .as_deref(),
        Some("http://two.example")
    );

    record.metadata_set(&session, "other", "x").await.unwrap();
    assert_eq!(storage.count(RECORD_TYPE_METADATA).await, 2);
}

#[tokio::test]
async fn test_metadata_is_scoped_to_connection() {
    let (session, _, first) = saved_record().await;
    let mut second = ConnRecord::default();
    second.save(&session, None).await.unwrap();

    first.metadata_set(&session, "key", "first").await.unwrap();
    assert_eq!(second.metadata_get(&session, "key", None).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_metadata_set_keeps_one_entry() {
    let (session, storage, record) = saved_record().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let session = session.clone();
        let record = record.clone();
        handles.push(tokio::spawn(async move {
            record
                .metadata_set(&session, "shared", &format!("value-{i}"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(storage.count(RECORD_TYPE_METADATA).await, 1);
    let value = record
        .metadata_get(&session, "shared", None)
        .await
        .unwrap()
        .unwrap();
    assert!(value.starts_with("value-"));
}

#[tokio::test]
async fn test_duplicate_metadata_surfaces_on_read_and_write() {
    let (session, storage, record) = saved_record().await;
    let tags = Tags::from([
        ("key".to_string(), "dup".to_string()),
        (
            "connection_id".to_string(),
            record.connection_id().unwrap().to_string(),
        ),
    ]);
    for value in ["a", "b"] {
        storage
            .add_record(StorageRecord::new(RECORD_TYPE_METADATA, value, tags.clone()))
            .await
            .unwrap();
    }

    assert!(record
        .metadata_get(&session, "dup", None)
        .await
        .unwrap_err()
        .is_duplicate());
    assert_matches!(
        record.metadata_set(&session, "dup", "c").await,
        Err(ConnectionError::Storage(StorageError::Duplicate { count: 2, .. }))
    );
}
