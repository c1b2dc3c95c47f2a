#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use qrlink_api::auth::jwt::JwtConfig;
use qrlink_api::auth::password::hash_password;
use qrlink_api::config::ServerConfig;
use qrlink_api::router::build_app_router;
use qrlink_api::session::QrConfig;
use qrlink_api::state::AppState;
use qrlink_api::ws::WsManager;
use qrlink_core::qr::FlowVariant;
use qrlink_core::user::{MemoryUserDirectory, User};
use async_trait::async_trait;
use qrlink_store::{MemoryStore, SessionStore, StoreError, StoreResult};

/// Password shared by every seeded user.
pub const PASSWORD: &str = "correct-horse-battery-staple";

pub const ALICE_ID: &str = "u-alice";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const BOB_ID: &str = "u-bob";
pub const BOB_EMAIL: &str = "bob@example.com";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        store_sweep_interval_secs: 30,
        redis_url: None,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
            session_ttl_days: 7,
        },
        qr: QrConfig {
            pending_ttl_secs: 120,
            authenticated_ttl_secs: 60,
            default_flow: FlowVariant::Handoff,
        },
    }
}

/// Argon2 is slow in debug builds; hash the shared password once.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).expect("hashing should succeed"))
        .clone()
}

pub fn test_user(id: &str, name: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role: "user".to_string(),
        password_hash: password_hash(),
        public_key: Some(format!("pk-{id}")),
    }
}

/// The full application plus handles on its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub users: Arc<MemoryUserDirectory>,
}

/// Build the full application router, backed by the memory store and a
/// directory seeded with Alice and Bob.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    users.insert(test_user(ALICE_ID, "Alice", ALICE_EMAIL));
    users.insert(test_user(BOB_ID, "Bob", BOB_EMAIL));

    let state = AppState::new(
        test_config(),
        store.clone(),
        users.clone(),
        Arc::new(WsManager::new()),
    );
    let router = build_app_router(state.clone());

    TestApp {
        router,
        state,
        store,
        users,
    }
}

/// A store whose backend is unreachable.
pub struct DownStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".into()))
}

#[async_trait]
impl SessionStore for DownStore {
    async fn put(&self, _key: &str, _value: &str, _ttl_secs: u64) -> StoreResult<()> {
        down()
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        down()
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        down()
    }

    async fn replace(&self, _key: &str, _value: &str, _ttl_secs: u64) -> StoreResult<bool> {
        down()
    }

    async fn take(&self, _key: &str) -> StoreResult<Option<String>> {
        down()
    }

    async fn rotate(&self, _old: &str, _new: &str, _value: &str, _ttl: u64) -> StoreResult<bool> {
        down()
    }

    async fn publish(&self, _channel: &str, _payload: &str) -> StoreResult<usize> {
        down()
    }

    async fn ping(&self) -> StoreResult<()> {
        down()
    }
}

/// A memory store whose session-marker writes fail while `fail_markers` is set.
/// Every other operation passes through.
pub struct FlakyMarkerStore {
    pub inner: MemoryStore,
    fail_markers: AtomicBool,
}

impl FlakyMarkerStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_markers: AtomicBool::new(false),
        }
    }

    pub fn fail_markers(&self, fail: bool) {
        self.fail_markers.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakyMarkerStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        if key.starts_with("session:") && self.fail_markers.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("marker write failed".into()));
        }
        self.inner.put(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn replace(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.inner.replace(key, value, ttl_secs).await
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.take(key).await
    }

    async fn rotate(&self, old: &str, new: &str, value: &str, ttl: u64) -> StoreResult<bool> {
        self.inner.rotate(old, new, value, ttl).await
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<usize> {
        self.inner.publish(channel, payload).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// Build the app over a [`FlakyMarkerStore`]. Returns the router, the store
/// handle and a token minted by the app's issuer for Alice.
pub fn build_app_with_flaky_store() -> (Router, Arc<FlakyMarkerStore>, String) {
    let store = Arc::new(FlakyMarkerStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let alice = test_user(ALICE_ID, "Alice", ALICE_EMAIL);
    users.insert(alice.clone());

    let state = AppState::new(
        test_config(),
        store.clone(),
        users,
        Arc::new(WsManager::new()),
    );
    let token = state.tokens.issue(&alice).expect("issue should succeed");
    (build_app_router(state), store, token)
}

/// Build the app over an unreachable store. Returns the router and a token
/// minted by the app's issuer for Alice.
pub fn build_app_with_down_store() -> (Router, String) {
    let users = Arc::new(MemoryUserDirectory::new());
    let alice = test_user(ALICE_ID, "Alice", ALICE_EMAIL);
    users.insert(alice.clone());

    let state = AppState::new(
        test_config(),
        Arc::new(DownStore),
        users,
        Arc::new(WsManager::new()),
    );
    let token = state.tokens.issue(&alice).expect("issue should succeed");
    (build_app_router(state), token)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Flow helpers
// ---------------------------------------------------------------------------

/// Log in via the API and return the token.
pub async fn login(app: Router, email: &str) -> String {
    let body = serde_json::json!({ "email": email, "password": PASSWORD });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .expect("login response must carry a token")
        .to_string()
}

/// Create a QR session as the holder of `token` and return its id.
pub async fn create_qr_session(app: Router, token: &str, flow: Option<&str>) -> String {
    let uri = match flow {
        Some(flow) => format!("/api/v1/auth/qr/sessions?flow={flow}"),
        None => "/api/v1/auth/qr/sessions".to_string(),
    };
    let response = post_json_auth(app, &uri, serde_json::json!({}), token).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["sessionId"]
        .as_str()
        .expect("create response must carry a sessionId")
        .to_string()
}

pub async fn poll(app: Router, session_id: &str) -> Value {
    let response = get(app, &format!("/api/v1/auth/qr/poll?sessionId={session_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}
