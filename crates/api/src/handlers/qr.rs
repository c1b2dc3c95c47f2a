//! Handlers for the `/auth/qr` resource.
//!
//! The initiator creates a session and polls it; the claimant either
//! authenticates it with its own token (hand-off flow) or claims it directly.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use qrlink_core::error::CoreError;
use qrlink_core::qr::FlowVariant;
use qrlink_core::user::UserInfo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::session::PollOutcome;
use crate::state::AppState;

use super::{require, SessionResponse, SuccessResponse};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query for `POST /auth/qr/sessions`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionQuery {
    pub flow: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Body for `POST /auth/qr/authenticate`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub encrypted_key_material: Option<String>,
}

/// Query for `GET /auth/qr/poll`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollQuery {
    pub session_id: Option<String>,
}

/// Body for `POST /auth/qr/claim`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimRequest {
    pub session_id: Option<String>,
}

/// Poll result, tagged by `status`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResponse {
    Pending,
    Expired,
    #[serde(rename_all = "camelCase")]
    Authenticated {
        token: String,
        user: UserInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        encrypted_key_material: Option<String>,
    },
}

impl From<PollOutcome> for PollResponse {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Pending => PollResponse::Pending,
            PollOutcome::Expired => PollResponse::Expired,
            PollOutcome::Authenticated {
                session,
                encrypted_key_material,
            } => PollResponse::Authenticated {
                token: session.token,
                user: session.user,
                encrypted_key_material,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/qr/sessions
///
/// Create a pending QR session owned by the caller.
pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<CreateSessionQuery>, QueryRejection>,
) -> AppResult<Json<CreateSessionResponse>> {
    let Query(params) = query?;
    let flow = params
        .flow
        .as_deref()
        .map(str::parse::<FlowVariant>)
        .transpose()
        .map_err(|e| AppError::Core(CoreError::MalformedRequest(e)))?;

    let session_id = state.qr.create(&auth.user_id, flow).await?;
    Ok(Json(CreateSessionResponse { session_id }))
}

/// POST /api/v1/auth/qr/authenticate
///
/// The claimant approves a hand-off session with its own token and attaches
/// key material encrypted for the initiator.
pub async fn authenticate(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<AuthenticateRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse>> {
    let Json(input) = payload?;
    let session_id = require(input.session_id, "sessionId")?;
    let user_id = require(input.user_id, "userId")?;

    state
        .qr
        .authenticate(
            &auth.user_id,
            &session_id,
            &user_id,
            input.encrypted_key_material,
        )
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/v1/auth/qr/poll?sessionId=
pub async fn poll(
    State(state): State<AppState>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> AppResult<Json<PollResponse>> {
    let Query(params) = query?;
    let session_id = require(params.session_id, "sessionId")?;

    let outcome = state.qr.poll(&session_id).await?;
    Ok(Json(PollResponse::from(outcome)))
}

/// POST /api/v1/auth/qr/claim
///
/// Log in as the owner of a direct-claim session.
pub async fn claim(
    State(state): State<AppState>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> AppResult<Json<SessionResponse>> {
    let Json(input) = payload?;
    let session_id = require(input.session_id, "sessionId")?;

    let issued = state.qr.claim(&session_id).await?;
    Ok(Json(SessionResponse::from(issued)))
}
