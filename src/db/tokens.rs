use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Token, TokenPurpose};

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    token_hash: &str,
    purpose: TokenPurpose,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> Result<Token, sqlx::Error> {
    sqlx::query_as::<_, Token>(
        "INSERT INTO tokens (token_hash, user_id, purpose, expires_at, created_at)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(purpose)
    .bind(expires_at)
    .bind(created_at)
    .fetch_one(executor)
    .await
}

pub async fn find_by_hash<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    token_hash: &str,
) -> Result<Option<Token>, sqlx::Error> {
    sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE token_hash = $1")
        .bind(token_hash)
        .fetch_optional(executor)
        .await
}

/// Same as [`find_by_hash`] but holds the row lock until the surrounding transaction ends.
pub async fn lock_by_hash<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    token_hash: &str,
) -> Result<Option<Token>, sqlx::Error> {
    sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE token_hash = $1 FOR UPDATE")
        .bind(token_hash)
        .fetch_optional(executor)
        .await
}

pub async fn expire<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    token_hash: &str,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tokens SET expires_at = $2 WHERE token_hash = $1")
        .bind(token_hash)
        .bind(at)
        .execute(executor)
        .await?;
    Ok(())
}
