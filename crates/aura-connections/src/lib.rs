//! # Aura Connections
//!
//! **Purpose**: Persist pairwise connection records negotiated under either the
//! RFC 160 connection protocol or RFC 23 DID exchange.
//!
//! The two protocols name the same roles and states differently. This crate
//! keeps one canonical record per connection and accepts either vocabulary on
//! the way in.
//!
//! ## Core Concepts
//!
//! - **Label pairs**: [`Role`] and [`State`] variants carry both labels; the
//!   RFC 160 label is what gets stored
//! - **Tags vs value**: DIDs, invitation key and request id are indexed tags;
//!   everything else is an opaque JSON value filtered in memory
//! - **Attached documents**: the originating invitation and request are stored
//!   beside the record and decoded by their `@type` discriminator
//! - **Metadata**: per-connection key/value strings with upsert semantics
//!
//! ## What's NOT in this crate
//!
//! - Protocol state machines deciding when a record changes state
//! - Durable storage engines (implement [`RecordStorage`])
//! - Message handlers or HTTP surfaces

#![forbid(unsafe_code)]

/// Error types for connection operations
pub mod error;

/// Closed label-pair enumerations for role and state
pub mod labels;

/// Routing, acceptance and invitation mode settings
pub mod modes;

/// Connection record entity and persistence
pub mod record;

/// Lookups by DID, invitation key and request id
pub mod retrieval;

/// Attached invitation and request documents
pub mod attachments;

/// Per-connection metadata
pub mod metadata;

/// Invitation and request message shapes
pub mod messages;

/// Tag-indexed storage collaborator
pub mod storage;

/// Cache collaborator
pub mod cache;

/// Session bundling collaborators and configuration
pub mod session;

/// Configuration loading
pub mod config;

pub use cache::{CacheEffects, MemoryCache};
pub use config::ConnectionsConfig;
pub use error::{ConnectionError, ConnectionResult};
pub use labels::{LabelQuery, Role, State};
pub use messages::{
    AgentMessage, ConnectionInvitation, ConnectionRequest, DidCommPrefix, DidExchangeRequest,
    Invitation, OobInvitation, Request,
};
pub use modes::{AcceptMode, InvitationMode, RoutingState};
pub use record::{ConnRecord, ConnRecordBuilder, ConnectionId};
pub use retrieval::PostFilter;
pub use session::RecordSession;
pub use storage::{MemoryRecordStorage, RecordStorage, StorageError, StorageRecord, TagFilter, Tags};
