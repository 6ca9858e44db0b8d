//! Events reported to the external consumer.
//!
//! Serialized with a `type` tag (`message-received`, `blob-failed`, ...)
//! and camelCase fields, except `requestID`, which keeps its wire casing.
//! The `id` is assigned once by whoever produces the event and is the only
//! key an acknowledgment is matched on.

use serde::{Deserialize, Serialize};

/// Free-form message headers carried alongside a message.
pub type Headers = serde_json::Map<String, serde_json::Value>;

/// Fresh event id (UUID v4).
pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceived {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDelivered {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFailed {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobReceived {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub last_update: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDelivered {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobFailed {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundEvent {
    MessageReceived(MessageReceived),
    MessageDelivered(MessageDelivered),
    MessageFailed(MessageFailed),
    BlobReceived(BlobReceived),
    BlobDelivered(BlobDelivered),
    BlobFailed(BlobFailed),
}

impl OutboundEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::MessageReceived(e) => &e.id,
            Self::MessageDelivered(e) => &e.id,
            Self::MessageFailed(e) => &e.id,
            Self::BlobReceived(e) => &e.id,
            Self::BlobDelivered(e) => &e.id,
            Self::BlobFailed(e) => &e.id,
        }
    }

    /// The serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageReceived(_) => "message-received",
            Self::MessageDelivered(_) => "message-delivered",
            Self::MessageFailed(_) => "message-failed",
            Self::BlobReceived(_) => "blob-received",
            Self::BlobDelivered(_) => "blob-delivered",
            Self::BlobFailed(_) => "blob-failed",
        }
    }
}

impl From<MessageReceived> for OutboundEvent {
    fn from(event: MessageReceived) -> Self {
        Self::MessageReceived(event)
    }
}

impl From<MessageDelivered> for OutboundEvent {
    fn from(event: MessageDelivered) -> Self {
        Self::MessageDelivered(event)
    }
}

impl From<MessageFailed> for OutboundEvent {
    fn from(event: MessageFailed) -> Self {
        Self::MessageFailed(event)
    }
}

impl From<BlobReceived> for OutboundEvent {
    fn from(event: BlobReceived) -> Self {
        Self::BlobReceived(event)
    }
}

impl From<BlobDelivered> for OutboundEvent {
    fn from(event: BlobDelivered) -> Self {
        Self::BlobDelivered(event)
    }
}

impl From<BlobFailed> for OutboundEvent {
    fn from(event: BlobFailed) -> Self {
        Self::BlobFailed(event)
    }
}
