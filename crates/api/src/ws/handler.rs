use axum::extract::rejection::QueryRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use qrlink_core::error::CoreError;
use qrlink_core::types::UserId;
use qrlink_events::ChatMessage;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::AppError;
use crate::state::AppState;
use crate::ws::frames::{ClientFrame, ServerFrame};

/// Query for `GET /ws`. Browsers cannot set headers on a WebSocket
/// handshake, so the token travels in the query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// HTTP handler that authenticates the caller and upgrades to WebSocket.
///
/// The token is checked before the upgrade so an unauthenticated client gets
/// a plain 401 instead of an open socket.
pub async fn ws_handler(
    State(state): State<AppState>,
    query: Result<Query<WsAuthQuery>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user_id = match authenticate(&state, query) {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state, user_id))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

fn authenticate(
    state: &AppState,
    query: Result<Query<WsAuthQuery>, QueryRejection>,
) -> Result<UserId, AppError> {
    let Query(params) = query?;
    let token = params
        .token
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Missing token".into())))?;

    let claims = state.tokens.verify(&token).map_err(|_| {
        AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
    })?;
    Ok(claims.user_id)
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with `WsManager` and joins the user's room.
///   2. Spawns a sender task draining the manager channel into the sink.
///   3. Spawns a room task turning chat messages into outbound frames.
///   4. Processes inbound frames on the current task.
///   5. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone(), user_id.clone()).await;
    let mut room = state.chat.join(&user_id).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    let room_manager = state.ws_manager.clone();
    let room_conn_id = conn_id.clone();
    let room_task = tokio::spawn(async move {
        loop {
            match room.recv().await {
                Ok(message) => {
                    let Some(frame) = encode(&ServerFrame::Message(message)) else {
                        continue;
                    };
                    if !room_manager.send_to(&room_conn_id, frame).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(conn_id = %room_conn_id, skipped, "WebSocket client lagging, messages dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                if let Err(reason) = dispatch(&state, &user_id, text.as_str()).await {
                    tracing::debug!(conn_id = %conn_id, %reason, "Inbound frame rejected");
                    if let Some(frame) = encode(&ServerFrame::Error { reason }) {
                        state.ws_manager.send_to(&conn_id, frame).await;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    room_task.abort();
    // The room receiver is only dropped once the aborted task has finished.
    let _ = room_task.await;
    state.chat.prune().await;
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Apply one inbound frame. Returns a client-facing reason on rejection.
async fn dispatch(state: &AppState, user_id: &str, raw: &str) -> Result<(), String> {
    let frame: ClientFrame =
        serde_json::from_str(raw).map_err(|e| format!("Unrecognized frame: {e}"))?;

    match frame {
        ClientFrame::SendMessage {
            receiver_id,
            content,
        } => {
            if receiver_id.trim().is_empty() || content.is_empty() {
                return Err("receiverId and content are required".into());
            }
            match state.users.find_by_id(&receiver_id).await {
                Ok(Some(_)) => {}
                Ok(None) => return Err("User not found".into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Receiver lookup failed");
                    return Err("Service temporarily unavailable".into());
                }
            }
            state
                .chat
                .send(&ChatMessage::new(user_id, receiver_id, content))
                .await;
            Ok(())
        }
    }
}

fn encode(frame: &ServerFrame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize WebSocket frame");
            None
        }
    }
}
