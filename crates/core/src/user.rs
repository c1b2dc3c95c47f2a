//! User records and the directory seam used to resolve them.
//!
//! Persistent user storage lives outside this workspace's core; the hand-off
//! protocol only needs to look users up by id or email, and to list a
//! caller's contacts. Production wires a
//! Postgres-backed directory (`qrlink-db`), tests and local development use
//! [`MemoryUserDirectory`].

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::UserId;

/// A user account as seen by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: String,
    /// PHC-formatted Argon2id hash.
    pub password_hash: String,
    /// Public key other users encrypt messages to.
    pub public_key: Option<String>,
}

/// Public user info returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// Entry in a user's contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<&User> for Contact {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Lookup interface over the external user store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;

    /// Every user except `user_id`, ordered by name.
    async fn list_except(&self, user_id: &str) -> Result<Vec<User>, CoreError>;
}

/// In-process directory keyed by user id.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn insert(&self, user: User) {
        self.write().insert(user.id.clone(), user);
    }

    /// Remove a user, returning whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, User>> {
        // Inserts never leave the map half-written, so a poisoned guard is usable.
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, User>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError> {
        Ok(self.read().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        Ok(self
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_except(&self, user_id: &str) -> Result<Vec<User>, CoreError> {
        let mut users: Vec<User> = self
            .read()
            .values()
            .filter(|u| u.id != user_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }
}
