//! Route definitions for the `/auth/qr` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::qr;
use crate::state::AppState;

/// Routes mounted at `/auth/qr`.
///
/// ```text
/// POST /sessions      -> create_session (requires auth)
/// POST /authenticate  -> authenticate (requires auth)
/// GET  /poll          -> poll
/// POST /claim         -> claim
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(qr::create_session))
        .route("/authenticate", post(qr::authenticate))
        .route("/poll", get(qr::poll))
        .route("/claim", post(qr::claim))
}
