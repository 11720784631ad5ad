//! Invitation and request messages attached to connection records
//!
//! Two protocol generations produce structurally different invitations and
//! requests. The stored JSON is told apart by its `@type` discriminator, after
//! stripping the DIDComm prefix, through a closed dispatch table. A type
//! outside the table is an error rather than a fallback to either shape.

use crate::{ConnectionError, ConnectionResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unqualified type of an RFC 160 connection invitation
pub const CONNECTION_INVITATION: &str = "connections/1.0/invitation";
/// Unqualified type of an RFC 160 connection request
pub const CONNECTION_REQUEST: &str = "connections/1.0/request";
/// Unqualified type of an RFC 434 out-of-band invitation
pub const OOB_INVITATION: &str = "out-of-band/1.0/invitation";
/// Unqualified type of an RFC 23 DID exchange request
pub const DIDX_REQUEST: &str = "didexchange/1.0/request";

/// DIDComm message type prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DidCommPrefix {
    /// `https://didcomm.org/`
    New,
    /// `did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/`
    Old,
}

impl DidCommPrefix {
    /// Prefix text
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "https://didcomm.org/",
            Self::Old => "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/",
        }
    }

    /// Prefix selected by the `emit_new_didcomm_prefix` setting
    pub const fn from_config(emit_new: bool) -> Self {
        if emit_new {
            Self::New
        } else {
            Self::Old
        }
    }

    /// Qualify a message type with this prefix, replacing any existing prefix
    pub fn qualify(self, msg_type: &str) -> String {
        format!("{}{}", self.as_str(), Self::unqualify(msg_type))
    }

    /// Strip either prefix from a message type
    pub fn unqualify(msg_type: &str) -> &str {
        [Self::New, Self::Old]
            .into_iter()
            .find_map(|p| msg_type.strip_prefix(p.as_str()))
            .unwrap_or(msg_type)
    }
}

/// A typed agent message with a fixed unqualified `@type`
pub trait AgentMessage: Serialize + DeserializeOwned {
    /// Unqualified message type this shape decodes
    const MESSAGE_TYPE: &'static str;

    /// Qualified `@type` carried by this instance
    fn message_type(&self) -> &str;

    /// Canonical wire form
    fn to_json(&self) -> ConnectionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from parsed JSON, checking the discriminator
    fn from_value(value: Value) -> ConnectionResult<Self> {
        let message: Self = serde_json::from_value(value)?;
        let bare = DidCommPrefix::unqualify(message.message_type());
        if bare != Self::MESSAGE_TYPE {
            return Err(ConnectionError::UnknownMessageType {
                message_type: bare.to_string(),
            });
        }
        Ok(message)
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// RFC 160 connection invitation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInvitation {
    /// Qualified message type (`@type`)
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Message identifier (`@id`)
    #[serde(rename = "@id")]
    pub id: String,
    /// Sender's suggested display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Public DID, for invitations that carry no inline keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// Keys the invitee encrypts to
    #[serde(
        rename = "recipientKeys",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub recipient_keys: Option<Vec<String>>,
    /// Endpoint the invitee sends its request to
    #[serde(
        rename = "serviceEndpoint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub endpoint: Option<String>,
    /// Mediator keys wrapping the recipient keys
    #[serde(
        rename = "routingKeys",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub routing_keys: Option<Vec<String>>,
    /// Sender's avatar URL
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ConnectionInvitation {
    /// Invitation carrying inline keys and an endpoint
    pub fn new(
        prefix: DidCommPrefix,
        label: impl Into<String>,
        recipient_keys: Vec<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            msg_type: prefix.qualify(CONNECTION_INVITATION),
            id: new_message_id(),
            label: Some(label.into()),
            did: None,
            recipient_keys: Some(recipient_keys),
            endpoint: Some(endpoint.into()),
            routing_keys: None,
            image_url: None,
        }
    }

    /// Invitation pointing at a public DID
    pub fn with_public_did(prefix: DidCommPrefix, label: impl Into<String>, did: &str) -> Self {
        Self {
            msg_type: prefix.qualify(CONNECTION_INVITATION),
            id: new_message_id(),
            label: Some(label.into()),
            did: Some(did.to_string()),
            recipient_keys: None,
            endpoint: None,
            routing_keys: None,
            image_url: None,
        }
    }
}

impl AgentMessage for ConnectionInvitation {
    const MESSAGE_TYPE: &'static str = CONNECTION_INVITATION;

    fn message_type(&self) -> &str {
        &self.msg_type
    }
}

/// RFC 434 out-of-band invitation (1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OobInvitation {
    /// Qualified message type (`@type`)
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Message identifier (`@id`)
    #[serde(rename = "@id")]
    pub id: String,
    /// Sender's suggested display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Handshake protocols the inviter accepts, most preferred first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handshake_protocols: Vec<String>,
    /// Resolvable DIDs or inline service blocks
    #[serde(default)]
    pub services: Vec<Value>,
    /// Accepted DIDComm envelope profiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    /// Machine-readable goal of the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,
    /// Human-readable goal of the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Messages the invitee should answer once connected
    #[serde(
        rename = "requests~attach",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub requests_attach: Vec<Value>,
}

impl OobInvitation {
    /// Invitation offering the given handshake protocols over `services`
    pub fn new(
        prefix: DidCommPrefix,
        label: impl Into<String>,
        handshake_protocols: Vec<String>,
        services: Vec<Value>,
    ) -> Self {
        Self {
            msg_type: prefix.qualify(OOB_INVITATION),
            id: new_message_id(),
            label: Some(label.into()),
            handshake_protocols,
            services,
            accept: Vec::new(),
            goal_code: None,
            goal: None,
            requests_attach: Vec::new(),
        }
    }
}

impl AgentMessage for OobInvitation {
    const MESSAGE_TYPE: &'static str = OOB_INVITATION;

    fn message_type(&self) -> &str {
        &self.msg_type
    }
}

/// DID and DID document offered in an RFC 160 request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDetail {
    /// Offered DID
    #[serde(rename = "DID")]
    pub did: String,
    /// DID document for `did`
    #[serde(rename = "DIDDoc", default, skip_serializing_if = "Option::is_none")]
    pub did_doc: Option<Value>,
}

/// RFC 160 connection request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    /// Qualified message type (`@type`)
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Message identifier (`@id`)
    #[serde(rename = "@id")]
    pub id: String,
    /// Sender's suggested display label
    pub label: String,
    /// DID and DID document offered to the inviter
    pub connection: ConnectionDetail,
    /// Sender's avatar URL
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ConnectionRequest {
    /// Request offering `did`
    pub fn new(
        prefix: DidCommPrefix,
        label: impl Into<String>,
        did: impl Into<String>,
        did_doc: Option<Value>,
    ) -> Self {
        Self {
            msg_type: prefix.qualify(CONNECTION_REQUEST),
            id: new_message_id(),
            label: label.into(),
            connection: ConnectionDetail {
                did: did.into(),
                did_doc,
            },
            image_url: None,
        }
    }
}

impl AgentMessage for ConnectionRequest {
    const MESSAGE_TYPE: &'static str = CONNECTION_REQUEST;

    fn message_type(&self) -> &str {
        &self.msg_type
    }
}

/// Message thread decorator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    /// Parent thread, the invitation id for requests answering an invitation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

/// RFC 23 DID exchange request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidExchangeRequest {
    /// Qualified message type (`@type`)
    #[serde(rename = "@type")]
    pub msg_type: String,
    /// Message identifier (`@id`)
    #[serde(rename = "@id")]
    pub id: String,
    /// Thread decorator (`~thread`)
    #[serde(rename = "~thread", default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    /// Sender's suggested display label
    pub label: String,
    /// Machine-readable goal of the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_code: Option<String>,
    /// Human-readable goal of the exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    /// Offered DID
    pub did: String,
    /// Signed DID document attachment
    #[serde(
        rename = "did_doc~attach",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub did_doc_attach: Option<Value>,
}

impl DidExchangeRequest {
    /// Request offering `did`, threaded under invitation `pthid` when given
    pub fn new(
        prefix: DidCommPrefix,
        label: impl Into<String>,
        did: impl Into<String>,
        pthid: Option<String>,
    ) -> Self {
        Self {
            msg_type: prefix.qualify(DIDX_REQUEST),
            id: new_message_id(),
            thread: pthid.map(|pthid| Thread {
                thid: None,
                pthid: Some(pthid),
            }),
            label: label.into(),
            goal_code: None,
            goal: None,
            did: did.into(),
            did_doc_attach: None,
        }
    }
}

impl AgentMessage for DidExchangeRequest {
    const MESSAGE_TYPE: &'static str = DIDX_REQUEST;

    fn message_type(&self) -> &str {
        &self.msg_type
    }
}

type Decoder<T> = fn(Value) -> ConnectionResult<T>;

/// Pick the decoder for a stored document by its unqualified `@type`
fn dispatch<T>(json: &str, table: &[(&str, Decoder<T>)]) -> ConnectionResult<T> {
    let value: Value = serde_json::from_str(json)?;
    let msg_type = value
        .get("@type")
        .and_then(Value::as_str)
        .ok_or(ConnectionError::MissingMessageType)?;
    let bare = DidCommPrefix::unqualify(msg_type);
    let decode = table
        .iter()
        .find(|(known, _)| *known == bare)
        .map(|(_, decode)| *decode)
        .ok_or_else(|| ConnectionError::UnknownMessageType {
            message_type: bare.to_string(),
        })?;
    decode(value)
}

/// Invitation attached to a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Invitation {
    /// RFC 160 connection invitation
    Connection(ConnectionInvitation),
    /// RFC 434 out-of-band invitation
    OutOfBand(OobInvitation),
}

impl Invitation {
    const TYPES: &'static [(&'static str, Decoder<Invitation>)] = &[
        (CONNECTION_INVITATION, decode_connection_invitation),
        (OOB_INVITATION, decode_oob_invitation),
    ];

    /// Canonical wire form
    pub fn to_json(&self) -> ConnectionResult<String> {
        match self {
            Self::Connection(msg) => msg.to_json(),
            Self::OutOfBand(msg) => msg.to_json(),
        }
    }

    /// Qualified `@type`
    pub fn message_type(&self) -> &str {
        match self {
            Self::Connection(msg) => msg.message_type(),
            Self::OutOfBand(msg) => msg.message_type(),
        }
    }

    /// Decode a stored invitation, selecting the shape by `@type`
    pub fn from_json(json: &str) -> ConnectionResult<Self> {
        dispatch(json, Self::TYPES)
    }
}

fn decode_connection_invitation(value: Value) -> ConnectionResult<Invitation> {
    ConnectionInvitation::from_value(value).map(Invitation::Connection)
}

fn decode_oob_invitation(value: Value) -> ConnectionResult<Invitation> {
    OobInvitation::from_value(value).map(Invitation::OutOfBand)
}

impl From<ConnectionInvitation> for Invitation {
    fn from(msg: ConnectionInvitation) -> Self {
        Self::Connection(msg)
    }
}

impl From<OobInvitation> for Invitation {
    fn from(msg: OobInvitation) -> Self {
        Self::OutOfBand(msg)
    }
}

/// Request attached to a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// RFC 160 connection request
    Connection(ConnectionRequest),
    /// RFC 23 DID exchange request
    DidExchange(DidExchangeRequest),
}

impl Request {
    const TYPES: &'static [(&'static str, Decoder<Request>)] = &[
        (CONNECTION_REQUEST, decode_connection_request),
        (DIDX_REQUEST, decode_didx_request),
    ];

    /// Canonical wire form
    pub fn to_json(&self) -> ConnectionResult<String> {
        match self {
            Self::Connection(msg) => msg.to_json(),
            Self::DidExchange(msg) => msg.to_json(),
        }
    }

    /// Qualified `@type`
    pub fn message_type(&self) -> &str {
        match self {
            Self::Connection(msg) => msg.message_type(),
            Self::DidExchange(msg) => msg.message_type(),
        }
    }

    /// Decode a stored request, selecting the shape by `@type`
    pub fn from_json(json: &str) -> ConnectionResult<Self> {
        dispatch(json, Self::TYPES)
    }
}

fn decode_connection_request(value: Value) -> ConnectionResult<Request> {
    ConnectionRequest::from_value(value).map(Request::Connection)
}

fn decode_didx_request(value: Value) -> ConnectionResult<Request> {
    DidExchangeRequest::from_value(value).map(Request::DidExchange)
}

impl From<ConnectionRequest> for Request {
    fn from(msg: ConnectionRequest) -> Self {
        Self::Connection(msg)
    }
}

impl From<DidExchangeRequest> for Request {
    fn from(msg: DidExchangeRequest) -> Self {
        Self::DidExchange(msg)
    }
}
