pub mod auth;
pub mod chat;
pub mod health;
pub mod qr;
pub mod users;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                              WebSocket (?token=)
///
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public)
/// /auth/logout                                     logout (public)
/// /auth/me                                         current user (requires auth)
///
/// /auth/qr/sessions                                create (requires auth)
/// /auth/qr/authenticate                            authenticate (requires auth)
/// /auth/qr/poll                                    poll (public)
/// /auth/qr/claim                                   claim (public)
///
/// /chat/send                                       send message (requires auth)
///
/// /users                                           contact list (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .nest("/chat", chat::router())
        .nest("/users", users::router())
}
