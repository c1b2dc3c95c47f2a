//! Login, logout and refresh over per-token session markers.
//!
//! A token is honorable for refresh only while its marker
//! (`session:{userId}:{sha256(token)}`) exists in the store. Logging out
//! deletes the marker; refreshing atomically swaps the old marker for the
//! new token's marker, so every token can be refreshed at most once.

use std::sync::Arc;

use qrlink_core::error::CoreError;
use qrlink_core::qr::redact;
use qrlink_core::user::{User, UserDirectory, UserInfo};
use qrlink_store::{keys, SessionStore};
use serde::Serialize;

use crate::auth::jwt::{Claims, TokenError, TokenIssuer};
use crate::auth::password::verify_password;

/// A freshly opened session: the token plus the public view of its user.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub user: UserInfo,
}

pub struct SessionLifecycle {
    store: Arc<dyn SessionStore>,
    users: Arc<dyn UserDirectory>,
    tokens: Arc<TokenIssuer>,
    session_ttl_secs: u64,
}

impl SessionLifecycle {
    pub fn new(
        store: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
        tokens: Arc<TokenIssuer>,
        session_ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            users,
            tokens,
            session_ttl_secs,
        }
    }

    /// Authenticate with email and password and open a session.
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, CoreError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(invalid_credentials)?;

        let password_valid = verify_password(password, &user.password_hash)
            .map_err(|e| CoreError::Internal(format!("Password verification error: {e}")))?;
        if !password_valid {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(invalid_credentials());
        }

        self.open_session(&user).await
    }

    /// Mint a token for `user` and record its session marker.
    pub async fn open_session(&self, user: &User) -> Result<IssuedSession, CoreError> {
        let token = self.tokens.issue(user).map_err(token_failure)?;

        self.store
            .put(
                &keys::session_marker(&user.id, &token),
                keys::MARKER_VALUE,
                self.session_ttl_secs,
            )
            .await?;

        tracing::info!(user_id = %user.id, "Session opened");
        Ok(IssuedSession {
            token,
            user: UserInfo::from(user),
        })
    }

    /// Delete the marker of a session opened by this process.
    pub(crate) async fn revoke(&self, session: &IssuedSession) -> Result<(), CoreError> {
        self.store
            .delete(&keys::session_marker(&session.user.id, &session.token))
            .await?;
        Ok(())
    }

    /// Revoke `token`'s marker.
    ///
    /// Idempotent: an already revoked or undecodable token is still a
    /// success. Only store failures are reported.
    pub async fn logout(&self, token: &str) -> Result<(), CoreError> {
        let claims = match TokenIssuer::decode_unverified(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Logout with undecodable token");
                return Ok(());
            }
        };

        let removed = self
            .store
            .delete(&keys::session_marker(&claims.user_id, token))
            .await?;

        tracing::info!(user_id = %claims.user_id, removed, "Session closed");
        Ok(())
    }

    /// Exchange `old` for a new token, consuming `old`'s marker.
    ///
    /// A token whose only defect is expiry is still refreshable while its
    /// marker lives.
    pub async fn refresh(&self, old: &str) -> Result<String, CoreError> {
        let claims = self.refreshable_claims(old)?;

        let user = self
            .users
            .find_by_id(&claims.user_id)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("User no longer exists".into()))?;

        let token = self.tokens.issue(&user).map_err(token_failure)?;

        let rotated = self
            .store
            .rotate(
                &keys::session_marker(&claims.user_id, old),
                &keys::session_marker(&user.id, &token),
                keys::MARKER_VALUE,
                self.session_ttl_secs,
            )
            .await?;
        if !rotated {
            tracing::info!(
                user_id = %claims.user_id,
                token = %redact(old),
                "Refresh rejected: session revoked or already rotated"
            );
            return Err(CoreError::Unauthorized("Session expired or revoked".into()));
        }

        tracing::info!(user_id = %user.id, "Session refreshed");
        Ok(token)
    }

    fn refreshable_claims(&self, token: &str) -> Result<Claims, CoreError> {
        match self.tokens.verify(token) {
            Ok(claims) => Ok(claims),
            Err(TokenError::Expired) => TokenIssuer::decode_unverified(token)
                .map_err(|_| CoreError::Unauthorized("Invalid token".into())),
            Err(_) => Err(CoreError::Unauthorized("Invalid token".into())),
        }
    }
}

fn invalid_credentials() -> CoreError {
    CoreError::Unauthorized("Invalid credentials".into())
}

fn token_failure(err: TokenError) -> CoreError {
    CoreError::Internal(format!("Token generation error: {err}"))
}
