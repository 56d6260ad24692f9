//! Event envelopes exchanged over the WebSocket transport.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`. The
//! names are the protocol: connected clients register listeners keyed on them,
//! so renaming a variant here is a breaking wire change even though the Rust
//! identifiers are free to differ.
//!
//! # Invariants
//!
//! - Each variant maps to exactly one wire name (enforced by the serde tag).
//! - Decoding an unknown name or malformed payload returns an error; it never
//!   panics. The transport drops such frames and keeps the connection up.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    ids::{RoomId, UserId},
};

/// Server-to-client event.
///
/// Carries routed notifications: the presence snapshot, new group messages,
/// and group lifecycle changes. The registry treats payloads as opaque; only
/// the identities used for routing are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full snapshot of currently-online users. Broadcast to every live
    /// connection after each connect and disconnect; not a delta.
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<UserId>),

    /// A message was posted to a group the recipient has joined.
    #[serde(rename = "newGroupMessage")]
    NewGroupMessage(GroupMessageEnvelope),

    /// The recipient was added to a freshly created group.
    #[serde(rename = "newGroup")]
    NewGroup(Group),

    /// A group's membership changed (someone left, admin reassigned).
    #[serde(rename = "groupUpdated")]
    GroupUpdated(Group),
}

impl ServerEvent {
    /// Encode to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::encode(&e))
    }

    /// Decode from a JSON text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::malformed(&e))
    }
}

/// Client-to-server command.
///
/// Membership intents only. Message sending goes through the HTTP layer
/// (store-then-notify), never through the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    /// Join a group room. Clients replay one per known group after connect.
    #[serde(rename = "joinGroup")]
    JoinGroup(RoomId),

    /// Leave a group room.
    #[serde(rename = "leaveGroup")]
    LeaveGroup(RoomId),
}

impl ClientCommand {
    /// Encode to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::encode(&e))
    }

    /// Decode from a JSON text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::malformed(&e))
    }
}

/// Payload of [`ServerEvent::NewGroupMessage`].
///
/// The room id rides alongside the message so clients can route the event to
/// the right conversation without inspecting the message document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageEnvelope {
    /// The persisted message document.
    pub message: GroupMessage,
    /// Room the message belongs to.
    pub group_id: RoomId,
}

/// A group chat message as persisted by the message store.
///
/// Produced by the request-handling layer after a successful write; this core
/// only forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    /// Store-assigned message id.
    pub id: String,
    /// Room the message was posted to.
    pub group_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Text body, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Uploaded image URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A group document as persisted by the group store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Store-assigned group id; doubles as the room id for broadcasting.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Current members.
    pub participants: Vec<UserId>,
    /// Current admin. Reassigned by the group store when the admin leaves.
    pub admin: UserId,
}
