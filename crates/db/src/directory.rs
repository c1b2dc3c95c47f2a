//! [`UserDirectory`] implementation over Postgres.

use async_trait::async_trait;
use qrlink_core::error::CoreError;
use qrlink_core::user::{User, UserDirectory};

use crate::repositories::UserRepo;
use crate::DbPool;

/// Resolves users from the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Directory failures are infrastructure failures, retryable like store outages.
fn unavailable(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "User directory query failed");
    CoreError::StoreUnavailable("user directory unavailable".into())
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError> {
        let row = UserRepo::find_by_id(&self.pool, id)
            .await
            .map_err(unavailable)?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let row = UserRepo::find_by_email(&self.pool, email)
            .await
            .map_err(unavailable)?;
        Ok(row.map(User::from))
    }

    async fn list_except(&self, user_id: &str) -> Result<Vec<User>, CoreError> {
        let rows = UserRepo::list_except(&self.pool, user_id)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
