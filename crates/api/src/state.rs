use std::sync::Arc;

use qrlink_core::user::UserDirectory;
use qrlink_events::ChatBus;
use qrlink_store::SessionStore;

use crate::auth::jwt::TokenIssuer;
use crate::config::ServerConfig;
use crate::session::{QrSessionMachine, SessionLifecycle};
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// The single session store handle, created once at startup.
    pub store: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserDirectory>,
    pub tokens: Arc<TokenIssuer>,
    pub sessions: Arc<SessionLifecycle>,
    pub qr: Arc<QrSessionMachine>,
    pub chat: Arc<ChatBus>,
    /// WebSocket connection manager (browser and mobile clients).
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// Wire every component around one store handle and one user directory.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        ws_manager: Arc<WsManager>,
    ) -> Self {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt));
        let sessions = Arc::new(SessionLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&users),
            Arc::clone(&tokens),
            config.jwt.session_ttl_secs(),
        ));
        let qr = Arc::new(QrSessionMachine::new(
            Arc::clone(&store),
            Arc::clone(&users),
            Arc::clone(&sessions),
            config.qr.clone(),
        ));
        let chat = Arc::new(ChatBus::default().with_mirror(Arc::clone(&store)));

        Self {
            config: Arc::new(config),
            store,
            users,
            tokens,
            sessions,
            qr,
            chat,
            ws_manager,
        }
    }
}
