//! Protocol error types.

use thiserror::Error;

/// Result alias for wire encode/decode operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from encoding or decoding wire events.
///
/// Decode failures are expected in normal operation (any peer can send
/// garbage) and must never take down more than the offending frame. Encode
/// failures indicate a bug in our own payload construction.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame text was not a valid event envelope.
    #[error("malformed event: {reason}")]
    Malformed {
        /// What the JSON parser rejected.
        reason: String,
    },

    /// An event we produced failed to serialize.
    #[error("event encoding failed: {reason}")]
    Encode {
        /// What the serializer rejected.
        reason: String,
    },
}

impl ProtocolError {
    pub(crate) fn malformed(err: &serde_json::Error) -> Self {
        Self::Malformed { reason: err.to_string() }
    }

    pub(crate) fn encode(err: &serde_json::Error) -> Self {
        Self::Encode { reason: err.to_string() }
    }
}
