//! Handlers for the `/auth` resource (login, refresh, logout, me).

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use qrlink_core::error::CoreError;
use qrlink_core::user::UserInfo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

use super::{require, SessionResponse, SuccessResponse};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// Profile returned by `GET /auth/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub info: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Profile,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns a token and the user.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<SessionResponse>> {
    let Json(input) = payload?;
    let email = require(input.email, "email")?;
    let password = require(input.password, "password")?;

    let issued = state.sessions.login(&email, &password).await?;
    Ok(Json(SessionResponse::from(issued)))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a token whose session marker is still live for a new one. The
/// presented token can never be refreshed again.
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> AppResult<Json<RefreshResponse>> {
    let Json(input) = payload?;
    let token = require(input.token, "token")?;

    let token = state.sessions.refresh(&token).await?;
    Ok(Json(RefreshResponse { token }))
}

/// POST /api/v1/auth/logout
///
/// Revoke the token's session marker. Always succeeds unless the store is
/// unreachable.
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse>> {
    let Json(input) = payload?;
    let token = require(input.token, "token")?;

    state.sessions.logout(&token).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeResponse>> {
    let user = state
        .users
        .find_by_id(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::UserNotFound(auth.user_id.clone())))?;

    Ok(Json(MeResponse {
        user: Profile {
            info: UserInfo::from(&user),
            public_key: user.public_key,
        },
    }))
}
