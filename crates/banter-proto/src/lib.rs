//! Wire model for the banter realtime layer.
//!
//! Defines the identity newtypes, the tagged event envelopes exchanged over
//! the WebSocket transport, and their JSON encoding. The event names on the
//! wire are part of the public protocol and must not change: clients dispatch
//! on them verbatim.
//!
//! The registry core never inspects payload contents - it only needs enough
//! identity (room or target user) to route each event. Everything else in a
//! payload is opaque data produced by the request-handling layer.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod events;
mod ids;

pub use errors::{ProtocolError, Result};
pub use events::{ClientCommand, Group, GroupMessage, GroupMessageEnvelope, ServerEvent};
pub use ids::{RoomId, UserId};
