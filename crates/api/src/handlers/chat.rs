//! Handler for `/chat/send`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use qrlink_core::error::CoreError;
use qrlink_events::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

use super::require;

/// Body for `POST /chat/send`. `content` is client-side ciphertext.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: ChatMessage,
}

/// POST /api/v1/chat/send
///
/// Fan a message out to the receiver's and the sender's rooms. The sender is
/// always the token subject.
pub async fn send(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> AppResult<Json<SendMessageResponse>> {
    let Json(input) = payload?;
    let receiver_id = require(input.receiver_id, "receiverId")?;
    let content = require(input.content, "content")?;

    if state.users.find_by_id(&receiver_id).await?.is_none() {
        return Err(AppError::Core(CoreError::UserNotFound(receiver_id)));
    }

    let message = ChatMessage::new(auth.user_id, receiver_id, content);
    state.chat.send(&message).await;

    Ok(Json(SendMessageResponse {
        success: true,
        message,
    }))
}
