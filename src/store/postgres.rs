use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use sqlx::PgPool;
use uuid::Uuid;

use crate::clock::Clock;
use crate::db;
use crate::models::{Role, Token, TokenPurpose, User};
use crate::store::{CredentialStore, StoreError, TokenEffect};

pub struct PgStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        match db::users::create(&self.pool, email, password_hash, role, self.clock.now()).await {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict(
                "Email already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(db::users::find_by_email(&self.pool, email).await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(db::users::find_by_id(&self.pool, id).await?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        Ok(db::users::update_password(&self.pool, id, password_hash, self.clock.now()).await?)
    }

    async fn insert_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        purpose: TokenPurpose,
        ttl: TimeDelta,
    ) -> Result<Token, StoreError> {
        let now = self.clock.now();
        Ok(db::tokens::create(&self.pool, user_id, token_hash, purpose, now + ttl, now).await?)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<Token>, StoreError> {
        Ok(db::tokens::find_by_hash(&self.pool, token_hash).await?)
    }

    async fn consume_token(
        &self,
        token_hash: &str,
        effect: TokenEffect<'_>,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // A concurrent consumer blocks here until the winner commits, then sees the new expiry.
        let Some(token) = db::tokens::lock_by_hash(&mut *tx, token_hash).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if token.purpose != effect.purpose() || !token.is_live(now) {
            return Ok(None);
        }

        let applied = match effect {
            TokenEffect::VerifyEmail => {
                db::users::mark_email_verified(&mut *tx, token.user_id, now).await?
            }
            TokenEffect::ResetPassword { password_hash } => {
                db::users::update_password(&mut *tx, token.user_id, password_hash, now).await?
            }
        };
        if !applied {
            return Ok(None);
        }

        db::tokens::expire(&mut *tx, &token.token_hash, now).await?;
        tx.commit().await?;

        Ok(Some(token.user_id))
    }
}
