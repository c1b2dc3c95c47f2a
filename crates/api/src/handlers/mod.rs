pub mod auth;
pub mod chat;
pub mod qr;
pub mod users;

use qrlink_core::error::CoreError;
use qrlink_core::user::UserInfo;
use serde::Serialize;

use crate::error::AppError;
use crate::session::IssuedSession;

/// `{ "success": true }`
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Body returned by every endpoint that opens a session (login, claim).
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: UserInfo,
}

impl From<IssuedSession> for SessionResponse {
    fn from(issued: IssuedSession) -> Self {
        Self {
            success: true,
            token: issued.token,
            user: issued.user,
        }
    }
}

/// Unwrap a required body field, rejecting missing and blank values.
pub(crate) fn require(value: Option<String>, field: &str) -> Result<String, AppError> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        AppError::Core(CoreError::MalformedRequest(format!(
            "Missing required field: {field}"
        )))
    })
}
