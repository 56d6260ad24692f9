//! Identity extraction at the WebSocket upgrade boundary.
//!
//! Clients identify themselves with a `userId` query parameter on the upgrade
//! request (`GET /?userId=abc123`). The value is taken verbatim, with no
//! percent-decoding and no verification: authentication happens upstream, this
//! layer only refuses connections that carry no identity at all. Rejection
//! happens before the upgrade completes, so an anonymous client never gets a
//! WebSocket session.

use banter_proto::UserId;
use tokio_tungstenite::tungstenite::{
    handshake::server::{ErrorResponse, Request},
    http::StatusCode,
};

/// Extract the connecting user's identity from the upgrade request.
///
/// Returns `None` if the request has no query string, no `userId` parameter,
/// or an empty `userId` value.
pub(crate) fn user_id_from_request(request: &Request) -> Option<UserId> {
    user_id_from_query(request.uri().query()?)
}

fn user_id_from_query(query: &str) -> Option<UserId> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("userId="))
        .filter(|value| !value.is_empty())
        .map(UserId::from)
}

/// 401 response returned to clients that present no identity.
pub(crate) fn unauthorized_response() -> ErrorResponse {
    let mut response = ErrorResponse::new(None);
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}
