//! Integration tests for the Knockout server: real WebSocket clients
//! talking to a real server on a random port.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use knockout::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = KnockoutServerBuilder::new()
        .bind("127.0.0.1:0")
        .room_config(RoomConfig {
            shuffle_turn_order: false,
            ..RoomConfig::default()
        })
        .build()
        .await
        .expect("server should build");

    let addr = server.local_addr().expect("should have local addr").to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Next server message, or `None` if the socket closed.
async fn recv(ws: &mut ClientWs) -> Option<ServerMessage> {
    loop {
        match ws.next().await? {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(text.as_str()).expect("decode"));
            }
            Ok(Message::Binary(data)) => {
                return Some(serde_json::from_slice(&data).expect("decode"));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Reads until a message matches `pred`, skipping everything else.
async fn recv_until(ws: &mut ClientWs, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
    tokio::time::timeout(WAIT, async {
        loop {
            match recv(ws).await {
                Some(msg) if pred(&msg) => return msg,
                Some(_) => continue,
                None => panic!("socket closed while waiting"),
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

/// Connects, sends `CONNECT` and returns the socket and assigned id.
async fn join(addr: &str, name: &str, room: Option<&str>) -> (ClientWs, ClientId) {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        &ClientMessage::Connect {
            client_name: name.into(),
            room: room.map(str::to_string),
        },
    )
    .await;
    let first = tokio::time::timeout(WAIT, recv(&mut ws))
        .await
        .expect("timed out waiting for CLIENT_ID");
    match first {
        Some(ServerMessage::Welcome {
            client_id,
            client_name,
        }) => {
            assert_eq!(client_name, name);
            (ws, client_id)
        }
        other => panic!("expected CLIENT_ID, got {other:?}"),
    }
}

fn ready() -> ClientMessage {
    ClientMessage::Ready {
        is_ready: true,
        wants_spectator: false,
    }
}

fn is_event(msg: &ServerMessage, text: &str) -> bool {
    matches!(msg, ServerMessage::GameEvent { message } if message == text)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_assigns_client_id_and_joins_room() {
    let addr = start_server().await;
    let (mut ws, id) = join(&addr, "alice", None).await;
    assert_ne!(id, ClientId::SERVER);

    let joined = recv_until(&mut ws, |m| matches!(m, ServerMessage::RoomJoin { .. })).await;
    assert_eq!(
        joined,
        ServerMessage::RoomJoin {
            client_id: id,
            client_name: "alice".into()
        }
    );
    let host = recv_until(&mut ws, |m| matches!(m, ServerMessage::HostStatus { .. })).await;
    assert_eq!(host, ServerMessage::HostStatus { is_host: true });
}

#[tokio::test]
async fn test_first_message_must_be_connect() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send(&mut ws, &ready()).await;

    match tokio::time::timeout(WAIT, recv(&mut ws)).await.expect("reply") {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, 400),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_name_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        &ClientMessage::Connect {
            client_name: "   ".into(),
            room: None,
        },
    )
    .await;

    match tokio::time::timeout(WAIT, recv(&mut ws)).await.expect("reply") {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, 400),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_frame_gets_error_and_connection_survives() {
    let addr = start_server().await;
    let (mut ws, id) = join(&addr, "alice", None).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    let err = recv_until(&mut ws, |m| matches!(m, ServerMessage::Error { .. })).await;
    assert!(matches!(err, ServerMessage::Error { code: 400, .. }));

    send(&mut ws, &ready()).await;
    let echoed = recv_until(&mut ws, |m| matches!(m, ServerMessage::Ready { .. })).await;
    assert_eq!(
        echoed,
        ServerMessage::Ready {
            client_id: id,
            is_ready: true
        }
    );
}

#[tokio::test]
async fn test_rejected_action_comes_back_as_server_message() {
    let addr = start_server().await;
    let (mut ws, _id) = join(&addr, "alice", None).await;

    send(&mut ws, &ClientMessage::Turn { choice: "r".into() }).await;
    let notice = recv_until(&mut ws, |m| {
        matches!(m, ServerMessage::Message { client_id, .. } if *client_id == ClientId::SERVER)
    })
    .await;
    assert_eq!(notice, ServerMessage::notice("You must be ready to do that."));
}

#[tokio::test]
async fn test_two_clients_play_to_a_winner() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr, "alice", None).await;
    let (mut bob, bob_id) = join(&addr, "bob", None).await;

    send(&mut alice, &ready()).await;
    send(&mut bob, &ready()).await;
    recv_until(&mut alice, |m| {
        *m == ServerMessage::Phase {
            phase: Phase::InProgress,
        }
    })
    .await;
    recv_until(&mut bob, |m| {
        *m == ServerMessage::Phase {
            phase: Phase::InProgress,
        }
    })
    .await;

    send(&mut alice, &ClientMessage::Turn { choice: "rock".into() }).await;
    recv_until(&mut alice, |m| *m == ServerMessage::TurnConfirmed).await;
    send(&mut bob, &ClientMessage::Turn { choice: "s".into() }).await;

    recv_until(&mut alice, |m| {
        *m == ServerMessage::Eliminated {
            client_id: bob_id,
            eliminated: true,
        }
    })
    .await;
    recv_until(&mut alice, |m| is_event(m, "alice wins the game!")).await;
    recv_until(&mut alice, |m| *m == ServerMessage::Phase { phase: Phase::Ready }).await;
    recv_until(&mut bob, |m| is_event(m, "alice wins the game!")).await;
}

#[tokio::test]
async fn test_chat_is_relayed_with_sender_id() {
    let addr = start_server().await;
    let (mut alice, alice_id) = join(&addr, "alice", None).await;
    let (mut bob, bob_id) = join(&addr, "bob", None).await;
    recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::RoomJoin { client_id, .. } if *client_id == bob_id)
    })
    .await;

    send(&mut alice, &ClientMessage::Message { message: "gl hf".into() }).await;
    let line = recv_until(&mut bob, |m| {
        matches!(m, ServerMessage::Message { client_id, .. } if *client_id != ClientId::SERVER)
    })
    .await;
    assert_eq!(
        line,
        ServerMessage::Message {
            client_id: alice_id,
            message: "gl hf".into()
        }
    );
}

#[tokio::test]
async fn test_disconnect_leaves_room() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr, "alice", None).await;
    let (mut bob, bob_id) = join(&addr, "bob", None).await;
    recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::RoomJoin { client_id, .. } if *client_id == bob_id)
    })
    .await;

    send(&mut bob, &ClientMessage::Disconnect).await;
    let left = recv_until(&mut alice, |m| matches!(m, ServerMessage::RoomLeave { .. })).await;
    assert_eq!(
        left,
        ServerMessage::RoomLeave {
            client_id: bob_id,
            client_name: "bob".into()
        }
    );
}

#[tokio::test]
async fn test_dropped_socket_leaves_room() {
    let addr = start_server().await;
    let (mut alice, _) = join(&addr, "alice", None).await;
    let (bob, bob_id) = join(&addr, "bob", None).await;
    drop(bob);

    let left = recv_until(&mut alice, |m| matches!(m, ServerMessage::RoomLeave { .. })).await;
    assert!(matches!(left, ServerMessage::RoomLeave { client_id, .. } if client_id == bob_id));
}

#[tokio::test]
async fn test_named_rooms_are_separate() {
    let addr = start_server().await;
    let (mut alice, alice_id) = join(&addr, "alice", Some("north")).await;
    recv_until(&mut alice, |m| matches!(m, ServerMessage::HostStatus { .. })).await;

    let (mut bob, _) = join(&addr, "bob", Some("south")).await;
    let host = recv_until(&mut bob, |m| matches!(m, ServerMessage::HostStatus { .. })).await;
    assert_eq!(host, ServerMessage::HostStatus { is_host: true });

    // Alice's room never hears about bob.
    send(&mut alice, &ready()).await;
    let next = recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::RoomJoin { .. } | ServerMessage::Ready { .. })
    })
    .await;
    assert_eq!(
        next,
        ServerMessage::Ready {
            client_id: alice_id,
            is_ready: true
        }
    );
}
