//! QR session records and the flow variants of the cross-device hand-off.
//!
//! A QR session is an ephemeral record keyed by an unguessable identifier
//! that is only ever transmitted through the rendered QR image and the
//! claimant's direct call. The record itself only ever holds two states;
//! "claimed" and "expired" are both represented by the record's absence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default lifetime of a freshly created (pending) QR session, in seconds.
pub const DEFAULT_PENDING_TTL_SECS: u64 = 120;

/// Default window the initiator has to collect an authenticated session.
pub const DEFAULT_AUTHENTICATED_TTL_SECS: u64 = 60;

/// Number of leading identifier characters that may appear in logs.
const LOG_PREFIX_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Status / flow
// ---------------------------------------------------------------------------

/// Stored status of a QR session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrStatus {
    Pending,
    Authenticated,
}

/// Which hand-off protocol a QR session follows.
///
/// - `Handoff`: the claimant authenticates with its own token and attaches
///   encrypted key material; the initiator collects it by polling.
/// - `DirectClaim`: the claimant presents only the identifier and is logged
///   in as the session owner in one call. No key material is ever stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowVariant {
    #[default]
    #[serde(rename = "handoff")]
    Handoff,
    #[serde(rename = "claim")]
    DirectClaim,
}

impl FlowVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowVariant::Handoff => "handoff",
            FlowVariant::DirectClaim => "claim",
        }
    }
}

impl fmt::Display for FlowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "handoff" => Ok(FlowVariant::Handoff),
            "claim" => Ok(FlowVariant::DirectClaim),
            other => Err(format!(
                "Unknown QR flow '{other}'. Expected 'handoff' or 'claim'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The value stored under `qr:{session_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrSessionRecord {
    pub status: QrStatus,
    /// Always the initiator's verified user id, fixed at creation.
    pub owner_user_id: UserId,
    pub flow: FlowVariant,
    /// Opaque key material, encrypted by the claimant under a secret derived
    /// from the session identifier. Only present once authenticated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key_material: Option<String>,
}

impl QrSessionRecord {
    /// A new pending record owned by the initiator.
    pub fn pending(owner_user_id: impl Into<UserId>, flow: FlowVariant) -> Self {
        Self {
            status: QrStatus::Pending,
            owner_user_id: owner_user_id.into(),
            flow,
            encrypted_key_material: None,
        }
    }

    /// Transition a pending record to authenticated, attaching key material.
    pub fn authenticate(self, encrypted_key_material: Option<String>) -> Self {
        Self {
            status: QrStatus::Authenticated,
            encrypted_key_material,
            ..self
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QrStatus::Pending
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored record.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Generate a fresh session identifier (UUID v4, 122 random bits).
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Shorten a session identifier or token for log output.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(LOG_PREFIX_LEN).collect();
    format!("{prefix}…")
}
