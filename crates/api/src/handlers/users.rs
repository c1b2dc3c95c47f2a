//! Handler for the `/users` resource.

use axum::extract::State;
use axum::Json;
use qrlink_core::user::Contact;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    pub users: Vec<Contact>,
}

/// GET /api/v1/users
///
/// The caller's contact list: every other user, which is where chat clients
/// learn the `receiverId` to address.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ContactListResponse>> {
    let users = state.users.list_except(&auth.user_id).await?;
    Ok(Json(ContactListResponse {
        users: users.iter().map(Contact::from).collect(),
    }))
}
