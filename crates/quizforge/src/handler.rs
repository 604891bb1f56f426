//! Per-connection handler: handshake, request routing and delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Spawn a writer task that drains the connection's outbound channel
//!   3. Loop: receive envelopes → heartbeat, disconnect or client request
//!   4. On exit, leave whatever room the connection was in

use std::sync::Arc;

use quizforge_protocol::{
    ClientRequest, Codec, Envelope, Payload, PlayerId, ProtocolError, Reply, SystemMessage,
};
use quizforge_room::{ConnectionSender, RoomError, RoomHandle};
use quizforge_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::QuizforgeError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that removes the connection from its room when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the async registry call runs in a spawned task.
struct MembershipGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for MembershipGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut registry = state.registry.lock().await;
            match registry.leave(conn_id).await {
                Ok(outcome) => {
                    tracing::debug!(%conn_id, room_empty = outcome.room_empty, "left room on disconnect");
                }
                Err(RoomError::NotAMember(_)) => {}
                Err(e) => tracing::debug!(%conn_id, error = %e, "leave on disconnect failed"),
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), QuizforgeError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, "client connected");

    // --- Step 2: Outbound channel and writer ---
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), rx));
    let _guard = MembershipGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    // --- Step 3: Message loop ---
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, dropping");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                let _ = tx.send(Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: state.now_ms(),
                }));
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%conn_id, %reason, "client disconnected");
                break;
            }
            Payload::Request(request) => {
                handle_request(&state, conn_id, &tx, request).await;
            }
            other => {
                tracing::debug!(%conn_id, payload = ?other, "ignoring unexpected payload");
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → leave fires.
    Ok(())
}

/// Routes one client request through the registry.
///
/// Create and join errors are answered with an error reply. Game actions
/// that do not apply are dropped and only logged.
async fn handle_request<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    tx: &ConnectionSender,
    request: ClientRequest,
) {
    let action = request.action();
    tracing::debug!(%conn_id, action, "request");

    match request {
        ClientRequest::CreateRoom { nickname } => {
            let result = {
                let mut registry = state.registry.lock().await;
                registry.create_room(conn_id, &nickname, tx.clone()).await
            };
            if let Err(e) = result {
                send_room_error(tx, conn_id, &e);
            }
        }
        ClientRequest::JoinRoom {
            room_code,
            nickname,
        } => {
            let result = {
                let mut registry = state.registry.lock().await;
                registry
                    .join_room(conn_id, &room_code, &nickname, tx.clone())
                    .await
            };
            match result {
                Ok(ack) => {
                    tracing::debug!(%conn_id, room_code = %ack.room_code, player_id = %ack.player_id, "joined");
                }
                Err(e) => send_room_error(tx, conn_id, &e),
            }
        }
        ClientRequest::StartGame { room_code } => {
            if let Some((handle, player_id)) = route(state, conn_id, action, &room_code).await {
                forwarded(conn_id, action, handle.start_game(player_id).await);
            }
        }
        ClientRequest::NextQuestion { room_code } => {
            if let Some((handle, player_id)) = route(state, conn_id, action, &room_code).await {
                forwarded(conn_id, action, handle.next_question(player_id).await);
            }
        }
        ClientRequest::SubmitAnswer {
            room_code,
            answer_index,
        } => {
            if let Some((handle, player_id)) = route(state, conn_id, action, &room_code).await {
                forwarded(
                    conn_id,
                    action,
                    handle.submit_answer(player_id, answer_index).await,
                );
            }
        }
    }
}

/// Resolves a game action to its room. The registry lock is held only for
/// the lookup; the actor does the rest.
async fn route<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    action: &str,
    room_code: &str,
) -> Option<(RoomHandle, PlayerId)> {
    let routed = state.registry.lock().await.route(conn_id, room_code);
    match routed {
        Ok(routed) => Some(routed),
        Err(reason) => {
            tracing::debug!(%conn_id, action, room_code, %reason, "action ignored");
            None
        }
    }
}

fn forwarded(conn_id: ConnectionId, action: &str, sent: Result<(), RoomError>) {
    if let Err(e) = sent {
        tracing::debug!(%conn_id, action, error = %e, "room unavailable");
    }
}

/// Performs the initial handshake: receive Handshake, validate, send Ack.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
) -> Result<(), QuizforgeError> {
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(QuizforgeError::Transport(e)),
        Err(_) => {
            reject(conn, state, "handshakeTimeout", "handshake timed out").await?;
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let version = match state.codec.decode::<Envelope>(&data) {
        Ok(Envelope {
            payload: Payload::System(SystemMessage::Handshake { version }),
            ..
        }) => version,
        _ => {
            reject(conn, state, "handshakeRequired", "expected Handshake").await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        let message = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        reject(conn, state, "versionMismatch", &message).await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let now = state.now_ms();
    let ack = Envelope {
        seq: 0,
        timestamp: now,
        payload: Payload::System(SystemMessage::HandshakeAck {
            connection_id: conn.id().into_inner(),
            server_time: now,
        }),
    };
    let bytes = state.codec.encode(&ack)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends a 400 error reply and closes the connection.
async fn reject<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    kind: &str,
    message: &str,
) -> Result<(), QuizforgeError> {
    tracing::debug!(conn_id = %conn.id(), kind, message, "rejecting handshake");
    let envelope = Envelope {
        seq: 0,
        timestamp: state.now_ms(),
        payload: Payload::Reply(Reply::Error {
            code: 400,
            kind: kind.to_string(),
            message: message.to_string(),
        }),
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    let _ = conn.close().await;
    Ok(())
}

/// Drains the outbound channel into the socket, numbering envelopes.
///
/// Ends when every sender is gone or the socket stops accepting frames.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut rx: mpsc::UnboundedReceiver<Payload>,
) {
    let conn_id = conn.id();
    let mut seq: u64 = 1;

    while let Some(payload) = rx.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: state.now_ms(),
            payload,
        };
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

fn send_room_error(tx: &ConnectionSender, conn_id: ConnectionId, err: &RoomError) {
    tracing::debug!(%conn_id, kind = err.kind(), error = %err, "request rejected");
    let _ = tx.send(Payload::Reply(Reply::Error {
        code: err.status_code(),
        kind: err.kind().to_string(),
        message: err.to_string(),
    }));
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
