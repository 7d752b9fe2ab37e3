//! Per-connection handler: handshake, room membership and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `CONNECT` within the handshake timeout
//!   2. Send `CLIENT_ID`, join the named (or default) room
//!   3. Spawn a writer task that drains the room's outbound channel
//!   4. Loop: receive frames → decode → route to the room

use std::sync::Arc;

use knockout_protocol::{ClientId, ClientMessage, Codec, ProtocolError, ServerMessage};
use knockout_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::KnockoutError;
use crate::server::ServerState;

/// Drop guard that takes a client out of their room when the handler exits.
///
/// Cleanup runs even if the handler bails early with `?`. `Drop` is
/// synchronous, so the async leave is spawned.
struct MembershipGuard<C: Codec> {
    client_id: ClientId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for MembershipGuard<C> {
    fn drop(&mut self) {
        let client_id = self.client_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut rooms = state.rooms.lock().await;
            if let Err(e) = rooms.leave(client_id).await {
                tracing::debug!(%client_id, error = %e, "leave on disconnect failed");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), KnockoutError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let (client_name, room) = perform_handshake(&conn, &state).await?;
    let client_id = ClientId(conn_id.into_inner());
    let room = room.unwrap_or_else(|| state.config.default_room.clone());

    let welcome = ServerMessage::Welcome {
        client_id,
        client_name: client_name.clone(),
    };
    conn.send(&state.codec.encode(&welcome)?).await?;
    tracing::info!(%conn_id, %client_id, %client_name, %room, "client connected");

    // --- Step 2: Join ---
    let conn = Arc::new(conn);
    let (tx, rx) = mpsc::unbounded_channel();
    let join_result = {
        let mut rooms = state.rooms.lock().await;
        rooms.join_or_create(client_id, &client_name, &room, tx).await
    };
    if let Err(e) = join_result {
        send_error(&*conn, &state.codec, 409, &e.to_string()).await?;
        return Err(e.into());
    }
    let guard = MembershipGuard {
        client_id,
        state: Arc::clone(&state),
    };

    // --- Step 3: Writer ---
    let writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        Arc::clone(&state),
        client_id,
        rx,
    ));

    // --- Step 4: Reader loop ---
    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%client_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%client_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%client_id, "connection idle too long");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "failed to decode message");
                send_error(&*conn, &state.codec, 400, &format!("invalid message: {e}")).await?;
                continue;
            }
        };

        if msg == ClientMessage::Disconnect {
            tracing::info!(%client_id, "client disconnected");
            break;
        }

        // PERF: the manager lock is held while the command is queued. Fine
        // while routing is this cheap; cache the RoomHandle per connection
        // if it shows up.
        let result = state.rooms.lock().await.route(client_id, msg).await;
        if let Err(e) = result {
            send_error(&*conn, &state.codec, 400, &e.to_string()).await?;
        }
    }

    // Leaving the room drops its sender, which ends the writer.
    drop(guard);
    let _ = writer.await;
    let _ = conn.close().await;
    Ok(())
}

/// Receives `CONNECT` and returns the client's name and requested room.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
) -> Result<(String, Option<String>), KnockoutError> {
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before CONNECT".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let msg: ClientMessage = match state.codec.decode(&data) {
        Ok(msg) => msg,
        Err(e) => {
            send_error(conn, &state.codec, 400, &format!("invalid message: {e}")).await?;
            return Err(e.into());
        }
    };

    match msg {
        ClientMessage::Connect { client_name, room } => {
            let client_name = client_name.trim().to_string();
            if client_name.is_empty() {
                send_error(conn, &state.codec, 400, "client_name must not be empty").await?;
                return Err(ProtocolError::InvalidMessage("empty client name".into()).into());
            }
            let room = room.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
            Ok((client_name, room))
        }
        _ => {
            send_error(conn, &state.codec, 400, "expected CONNECT").await?;
            Err(ProtocolError::InvalidMessage("first message must be CONNECT".into()).into())
        }
    }
}

/// Drains a client's outbound channel onto the socket, in order.
///
/// Stops when the room drops the sender or the socket stops accepting
/// writes. Dropping `rx` on a failed write is what lets the room notice
/// the client is gone.
async fn write_outbound<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    client_id: ClientId,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%client_id, error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%client_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Sends a connection-level `ERROR` to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), KnockoutError> {
    let bytes = codec.encode(&ServerMessage::Error {
        code,
        message: message.to_string(),
    })?;
    conn.send(&bytes).await?;
    Ok(())
}
