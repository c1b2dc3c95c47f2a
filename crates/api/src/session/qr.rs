//! The QR hand-off state machine.
//!
//! ```text
//!   create ──> Pending ──authenticate──> Authenticated ──poll──> (consumed)
//!                 │                            │
//!                 └──claim──> (consumed)       └──ttl──> (expired)
//! ```
//!
//! Only `Pending` and `Authenticated` are ever stored under `qr:{id}`;
//! consumed and expired sessions are simply absent. Consumption goes through
//! [`SessionStore::take`], so a session is handed off at most once even under
//! concurrent polls or claims. The take is the last fallible step: a poll or
//! claim that fails earlier leaves the record untouched.

use std::sync::Arc;

use qrlink_core::error::CoreError;
use qrlink_core::qr::{
    generate_session_id, redact, FlowVariant, QrSessionRecord, DEFAULT_AUTHENTICATED_TTL_SECS,
    DEFAULT_PENDING_TTL_SECS,
};
use qrlink_core::user::{User, UserDirectory};
use qrlink_store::{keys, SessionStore, StoreError};

use super::lifecycle::{IssuedSession, SessionLifecycle};
use crate::config::positive_env;

/// QR session lifetimes and the flow used when a client does not pick one.
#[derive(Debug, Clone)]
pub struct QrConfig {
    /// Lifetime of a freshly created session (default: 120).
    pub pending_ttl_secs: u64,
    /// Window the initiator has to collect an authenticated session (default: 60).
    pub authenticated_ttl_secs: u64,
    /// Flow for sessions created without an explicit `flow` (default: handoff).
    pub default_flow: FlowVariant,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
            authenticated_ttl_secs: DEFAULT_AUTHENTICATED_TTL_SECS,
            default_flow: FlowVariant::default(),
        }
    }
}

impl QrConfig {
    /// Load QR configuration from environment variables.
    ///
    /// | Env Var                     | Default   |
    /// |-----------------------------|-----------|
    /// | `QR_PENDING_TTL_SECS`       | `120`     |
    /// | `QR_AUTHENTICATED_TTL_SECS` | `60`      |
    /// | `QR_DEFAULT_FLOW`           | `handoff` |
    pub fn from_env() -> Self {
        let pending_ttl_secs: u64 = positive_env("QR_PENDING_TTL_SECS", DEFAULT_PENDING_TTL_SECS);
        let authenticated_ttl_secs: u64 =
            positive_env("QR_AUTHENTICATED_TTL_SECS", DEFAULT_AUTHENTICATED_TTL_SECS);

        let default_flow: FlowVariant = std::env::var("QR_DEFAULT_FLOW")
            .unwrap_or_else(|_| FlowVariant::default().to_string())
            .parse()
            .unwrap_or_else(|e| panic!("QR_DEFAULT_FLOW is invalid: {e}"));

        Self {
            pending_ttl_secs,
            authenticated_ttl_secs,
            default_flow,
        }
    }
}

/// Result of polling a QR session.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nobody has authenticated the session yet.
    Pending,
    /// The session expired, was already consumed, or never existed.
    Expired,
    /// The session was consumed by this poll.
    Authenticated {
        session: IssuedSession,
        encrypted_key_material: Option<String>,
    },
}

pub struct QrSessionMachine {
    store: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    sessions: Arc<SessionLifecycle>,
    config: QrConfig,
}

impl QrSessionMachine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        sessions: Arc<SessionLifecycle>,
        config: QrConfig,
    ) -> Self {
        Self {
            store,
            users,
            sessions,
            config,
        }
    }

    /// Create a pending session owned by `owner_user_id` and return its id.
    pub async fn create(
        &self,
        owner_user_id: &str,
        flow: Option<FlowVariant>,
    ) -> Result<String, CoreError> {
        let flow = flow.unwrap_or(self.config.default_flow);
        let session_id = generate_session_id();
        let record = QrSessionRecord::pending(owner_user_id, flow);

        self.store
            .put(
                &keys::qr_session(&session_id),
                &encode(&record)?,
                self.config.pending_ttl_secs,
            )
            .await?;

        tracing::info!(
            session = %redact(&session_id),
            owner = %owner_user_id,
            flow = %flow,
            "QR session created"
        );
        Ok(session_id)
    }

    /// Mark a pending hand-off session authenticated by `claimant_id`.
    ///
    /// `user_id` is the id the client put in the request body; it only has
    /// to agree with the verified `claimant_id`, it never grants anything on
    /// its own. Two concurrent calls on the same session both pass the
    /// pending check and the later write wins.
    pub async fn authenticate(
        &self,
        claimant_id: &str,
        session_id: &str,
        user_id: &str,
        encrypted_key_material: Option<String>,
    ) -> Result<(), CoreError> {
        if session_id.is_empty() || user_id.is_empty() {
            return Err(CoreError::MalformedRequest(
                "sessionId and userId are required".into(),
            ));
        }
        if user_id != claimant_id {
            return Err(CoreError::Unauthorized(
                "userId does not match the authenticated user".into(),
            ));
        }

        let key = keys::qr_session(session_id);
        let record = self
            .load(&key)
            .await?
            .filter(|r| r.is_pending() && r.flow == FlowVariant::Handoff)
            .ok_or(CoreError::SessionNotFound)?;

        self.resolve(user_id).await?;

        if record.owner_user_id != user_id {
            tracing::warn!(
                session = %redact(session_id),
                claimant = %claimant_id,
                "QR authenticate by a user other than the owner"
            );
            return Err(CoreError::Unauthorized(
                "Session belongs to a different user".into(),
            ));
        }

        let authenticated = record.authenticate(encrypted_key_material);
        let replaced = self
            .store
            .replace(
                &key,
                &encode(&authenticated)?,
                self.config.authenticated_ttl_secs,
            )
            .await?;
        if !replaced {
            return Err(CoreError::SessionNotFound);
        }

        tracing::info!(session = %redact(session_id), "QR session authenticated");
        Ok(())
    }

    /// Observe a session; consumes it when authenticated.
    ///
    /// The owner's session is opened before the record is taken, so a store
    /// failure on the way leaves the record in place for a retry.
    pub async fn poll(&self, session_id: &str) -> Result<PollOutcome, CoreError> {
        let key = keys::qr_session(session_id);
        let record = match self.load(&key).await? {
            None => return Ok(PollOutcome::Expired),
            Some(record) if record.is_pending() => return Ok(PollOutcome::Pending),
            Some(record) => record,
        };

        let owner = self.resolve(&record.owner_user_id).await?;
        let session = self.sessions.open_session(&owner).await?;

        let Some(raw) = self.consume(&key, &session).await? else {
            // Another poll consumed it between our read and take.
            return Ok(PollOutcome::Expired);
        };
        let record = decode(&key, &raw)?;

        tracing::info!(session = %redact(session_id), "QR session handed off");
        Ok(PollOutcome::Authenticated {
            session,
            encrypted_key_material: record.encrypted_key_material,
        })
    }

    /// Log in as the owner of a pending direct-claim session, consuming it.
    pub async fn claim(&self, session_id: &str) -> Result<IssuedSession, CoreError> {
        let key = keys::qr_session(session_id);
        let record = self
            .load(&key)
            .await?
            .filter(|r| r.is_pending() && r.flow == FlowVariant::DirectClaim)
            .ok_or(CoreError::SessionNotFound)?;

        let owner = self.resolve(&record.owner_user_id).await?;
        let session = self.sessions.open_session(&owner).await?;

        if self.consume(&key, &session).await?.is_none() {
            return Err(CoreError::SessionNotFound);
        }

        tracing::info!(session = %redact(session_id), "QR session claimed");
        Ok(session)
    }

    /// Take the record at `key` on behalf of the already opened `session`.
    ///
    /// When the take fails or finds nothing, `session` is revoked so no
    /// marker outlives a token that was never handed out.
    async fn consume(
        &self,
        key: &str,
        session: &IssuedSession,
    ) -> Result<Option<String>, CoreError> {
        let taken = self.store.take(key).await;
        if !matches!(taken, Ok(Some(_))) {
            if let Err(e) = self.sessions.revoke(session).await {
                tracing::warn!(error = %e, "Failed to revoke unused QR session marker");
            }
        }
        Ok(taken?)
    }

    async fn load(&self, key: &str) -> Result<Option<QrSessionRecord>, CoreError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(decode(key, &raw)?)),
            None => Ok(None),
        }
    }

    async fn resolve(&self, user_id: &str) -> Result<User, CoreError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))
    }
}

fn encode(record: &QrSessionRecord) -> Result<String, CoreError> {
    record
        .to_json()
        .map_err(|e| CoreError::Internal(format!("QR record serialization failed: {e}")))
}

fn decode(key: &str, raw: &str) -> Result<QrSessionRecord, CoreError> {
    QrSessionRecord::from_json(raw).map_err(|e| {
        StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
