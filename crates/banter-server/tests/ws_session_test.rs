//! WebSocket session tests.
//!
//! Runs a real server on an ephemeral port and drives it with
//! tokio-tungstenite clients: upgrade gating, presence frames on the wire,
//! room commands, and socket teardown.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use banter_proto::{ClientCommand, GroupMessage, RoomId, ServerEvent, UserId};
use banter_server::{Hub, MemoryDirectory, Server, ServerRuntimeConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{Error, Message, http::StatusCode},
};

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (SocketAddr, Arc<Hub<MemoryDirectory>>) {
    let config = ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), queue_depth: 64 };
    let server = Server::bind(config, MemoryDirectory::new()).await.unwrap();

    let addr = server.local_addr().unwrap();
    let hub = server.hub();

    tokio::spawn(server.run());

    (addr, hub)
}

async fn connect_client(addr: SocketAddr, user: &str) -> ClientSocket {
    let (socket, _response) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/?userId={user}")).await.unwrap();

    socket
}

/// Next protocol event on the socket, skipping control frames.
async fn next_event(socket: &mut ClientSocket) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket ended while waiting for event")
            .unwrap();

        if let Message::Text(text) = frame {
            return ServerEvent::decode(text.as_str()).unwrap();
        }
    }
}

async fn send_command(socket: &mut ClientSocket, command: &ClientCommand) {
    socket.send(Message::text(command.encode().unwrap())).await.unwrap();
}

/// Poll the hub until the membership change driven by a client command has
/// been applied.
async fn wait_for_membership(
    hub: &Hub<MemoryDirectory>,
    user: &UserId,
    room: &RoomId,
    expected: bool,
) {
    for _ in 0..500 {
        if hub.is_member(user, room).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("membership for {user} in {room} never became {expected}");
}

fn online(names: &[&str]) -> ServerEvent {
    ServerEvent::OnlineUsers(names.iter().map(|name| UserId::from(*name)).collect())
}

/// Clients receive the online set on connect, and again when it changes.
#[tokio::test]
async fn presence_reaches_clients_over_the_wire() {
    let (addr, _hub) = start_server().await;

    let mut alice = connect_client(addr, "alice").await;
    assert_eq!(next_event(&mut alice).await, online(&["alice"]));

    let mut bob = connect_client(addr, "bob").await;
    assert_eq!(next_event(&mut bob).await, online(&["alice", "bob"]));
    assert_eq!(next_event(&mut alice).await, online(&["alice", "bob"]));
}

/// Upgrades without a userId query parameter are refused with 401 before
/// any session exists.
#[tokio::test]
async fn anonymous_upgrade_is_rejected() {
    let (addr, hub) = start_server().await;

    let err = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await.unwrap_err();

    match err {
        Error::Http(response) => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
        other => panic!("expected HTTP rejection, got {other:?}"),
    }

    assert_eq!(hub.session_count().await, 0);
}

/// Join commands, fan-out, and leave commands work end to end, and garbage
/// frames along the way do not kill the session.
#[tokio::test]
async fn join_message_leave_round_trip() {
    let (addr, hub) = start_server().await;
    let room = RoomId::from("rust");
    let alice_id = UserId::from("alice");
    let bob_id = UserId::from("bob");

    let mut alice = connect_client(addr, "alice").await;
    assert_eq!(next_event(&mut alice).await, online(&["alice"]));

    let mut bob = connect_client(addr, "bob").await;
    assert_eq!(next_event(&mut bob).await, online(&["alice", "bob"]));
    assert_eq!(next_event(&mut alice).await, online(&["alice", "bob"]));

    // Unparseable input is logged and dropped, not fatal.
    bob.send(Message::text("not json")).await.unwrap();
    bob.send(Message::Binary(vec![0xde, 0xad].into())).await.unwrap();

    send_command(&mut bob, &ClientCommand::JoinGroup(room.clone())).await;
    wait_for_membership(&hub, &bob_id, &room, true).await;

    let message = GroupMessage {
        id: "m1".to_string(),
        group_id: room.clone(),
        sender_id: alice_id.clone(),
        text: Some("hello bob".to_string()),
        image: None,
    };

    let delivered = hub.notify_new_group_message(&room, message, &alice_id).await.unwrap();
    assert_eq!(delivered, 1);

    match next_event(&mut bob).await {
        ServerEvent::NewGroupMessage(envelope) => {
            assert_eq!(envelope.group_id, room);
            assert_eq!(envelope.message.id, "m1");
            assert_eq!(envelope.message.text.as_deref(), Some("hello bob"));
        },
        other => panic!("expected group message, got {other:?}"),
    }

    send_command(&mut bob, &ClientCommand::LeaveGroup(room.clone())).await;
    wait_for_membership(&hub, &bob_id, &room, false).await;

    let message = GroupMessage {
        id: "m2".to_string(),
        group_id: room.clone(),
        sender_id: alice_id.clone(),
        text: Some("anyone there?".to_string()),
        image: None,
    };

    let delivered = hub.notify_new_group_message(&room, message, &alice_id).await.unwrap();
    assert_eq!(delivered, 0);
}

/// Closing the socket takes the user offline and announces the new set.
#[tokio::test]
async fn socket_close_publishes_departure() {
    let (addr, hub) = start_server().await;

    let mut alice = connect_client(addr, "alice").await;
    assert_eq!(next_event(&mut alice).await, online(&["alice"]));

    let mut bob = connect_client(addr, "bob").await;
    assert_eq!(next_event(&mut bob).await, online(&["alice", "bob"]));
    assert_eq!(next_event(&mut alice).await, online(&["alice", "bob"]));

    bob.close(None).await.unwrap();

    assert_eq!(next_event(&mut alice).await, online(&["alice"]));

    for _ in 0..500 {
        if !hub.is_online(&UserId::from("bob")).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!hub.is_online(&UserId::from("bob")).await);
}

/// A second connection for the same user supersedes the first, and the
/// server closes the superseded socket.
#[tokio::test]
async fn reconnect_supersedes_previous_socket() {
    let (addr, hub) = start_server().await;

    let mut first = connect_client(addr, "alice").await;
    assert_eq!(next_event(&mut first).await, online(&["alice"]));

    let mut second = connect_client(addr, "alice").await;
    assert_eq!(next_event(&mut second).await, online(&["alice"]));

    // The first socket drains to a close; only Close frames or the end of
    // the stream may remain.
    loop {
        match tokio::time::timeout(Duration::from_secs(5), first.next())
            .await
            .expect("timed out waiting for superseded socket to close")
        {
            None | Some(Err(_)) => break,
            Some(Ok(Message::Close(_))) => {},
            Some(Ok(Message::Text(text))) => {
                panic!("unexpected frame on superseded socket: {text}")
            },
            Some(Ok(_)) => {},
        }
    }

    assert_eq!(hub.session_count().await, 1);
    assert!(hub.is_online(&UserId::from("alice")).await);
}
