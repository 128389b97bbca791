//! Credential store: persistence for users and single-use tokens.
//!
//! Two backends implement [`CredentialStore`]: [`PgStore`] for Postgres and
//! [`MemoryStore`] for development and tests. Both stamp rows with their own
//! [`Clock`](crate::clock::Clock) so that token consumption can read the time
//! only once the token row is exclusively held.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Role, Token, TokenPurpose, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug)]
pub enum StoreError {
    Conflict(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            StoreError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

/// State change applied when a token is consumed.
#[derive(Debug, Clone, Copy)]
pub enum TokenEffect<'a> {
    VerifyEmail,
    ResetPassword { password_hash: &'a str },
}

impl TokenEffect<'_> {
    pub fn purpose(&self) -> TokenPurpose {
        match self {
            TokenEffect::VerifyEmail => TokenPurpose::VerifyEmail,
            TokenEffect::ResetPassword { .. } => TokenPurpose::ResetPassword,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a user. Fails with [`StoreError::Conflict`] if the email is taken.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Replace a user's password hash and stamp the change time. Returns false if the user is gone.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError>;

    async fn insert_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        purpose: TokenPurpose,
        ttl: chrono::TimeDelta,
    ) -> Result<Token, StoreError>;

    async fn find_token(&self, token_hash: &str) -> Result<Option<Token>, StoreError>;

    /// Atomically apply `effect` to the token's owner and expire the token.
    ///
    /// Returns the owner's id, or `None` when the token is unknown, already
    /// expired, or was issued for a different purpose. Concurrent calls for
    /// one token are serialized; at most one returns `Some`.
    async fn consume_token(
        &self,
        token_hash: &str,
        effect: TokenEffect<'_>,
    ) -> Result<Option<Uuid>, StoreError>;
}
