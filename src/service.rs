//! Account operations: registration, credential checks, and the token
//! lifecycle behind email verification and password reset.
//!
//! Tokens are random, hashed at rest, bound to one purpose and valid for a
//! fixed window. Consuming one is a single store call that applies the user
//! change and expires the token together.

use std::sync::{Arc, LazyLock};

use chrono::TimeDelta;
use regex::Regex;

use crate::auth::Principal;
use crate::auth::password;
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{Role, TokenPurpose, User};
use crate::notify::{Notification, Notifier};
use crate::store::{CredentialStore, TokenEffect};
use crate::tokens;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").unwrap());

#[derive(Debug, Clone)]
pub struct AccountPolicy {
    pub token_ttl: TimeDelta,
    /// Report unknown emails as NotFound on public operations.
    pub reveal_accounts: bool,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            token_ttl: TimeDelta::hours(1),
            reveal_accounts: false,
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: AccountPolicy,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: AccountPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            policy,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        validate_email(email)?;
        password::check_policy(password).map_err(AppError::BadRequest)?;

        if self.store.find_user_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let pw_hash = password::hash(password).map_err(AppError::Internal)?;
        // The unique index still guards against a concurrent registration of the same email.
        let user = self.store.create_user(email, &pw_hash, Role::User).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Credentials login. Unknown email and wrong password fail identically.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(invalid)?;

        let valid = password::verify(password, &user.password_hash).map_err(AppError::Internal)?;
        if !valid {
            return Err(invalid());
        }

        Ok(user)
    }

    pub async fn detail(&self, principal: &Principal) -> Result<User, AppError> {
        self.store
            .find_user_by_id(principal.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn send_verification_email(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if user.is_verified() {
            return Err(AppError::Conflict("Email already verified".to_string()));
        }

        self.issue_token(&user, TokenPurpose::VerifyEmail).await?;
        Ok(())
    }

    pub async fn send_forgot_password_email(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            if self.policy.reveal_accounts {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        self.issue_token(&user, TokenPurpose::ResetPassword).await?;
        Ok(())
    }

    /// Persist a new token for `user` and hand it to the notifier.
    ///
    /// Older tokens of the user stay untouched. If dispatch fails the token
    /// row is kept and the error is returned; nothing is retried.
    pub async fn issue_token(&self, user: &User, purpose: TokenPurpose) -> Result<String, AppError> {
        let token = tokens::generate();
        self.store
            .insert_token(user.id, &tokens::digest(&token), purpose, self.policy.token_ttl)
            .await?;

        let notification = Notification {
            email: user.email.clone(),
            token: token.clone(),
            purpose,
        };
        if let Err(e) = self.notifier.send(&notification).await {
            tracing::warn!(user_id = %user.id, ?purpose, "Token persisted but dispatch failed");
            return Err(AppError::Internal(format!("Failed to dispatch email: {e}")));
        }

        tracing::info!(user_id = %user.id, ?purpose, "Token issued");
        Ok(token)
    }

    /// Read-only liveness check. Unknown tokens read as not valid.
    pub async fn is_token_valid(&self, token: &str) -> Result<bool, AppError> {
        let found = self.store.find_token(&tokens::digest(token)).await?;
        Ok(found.is_some_and(|t| t.is_live(self.clock.now())))
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        let user_id = self
            .store
            .consume_token(&tokens::digest(token), TokenEffect::VerifyEmail)
            .await?
            .ok_or_else(token_not_found)?;

        tracing::info!(%user_id, "Email verified");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        password::check_policy(new_password).map_err(AppError::BadRequest)?;
        let pw_hash = password::hash(new_password).map_err(AppError::Internal)?;

        let user_id = self
            .store
            .consume_token(
                &tokens::digest(token),
                TokenEffect::ResetPassword {
                    password_hash: &pw_hash,
                },
            )
            .await?
            .ok_or_else(token_not_found)?;

        tracing::info!(%user_id, "Password reset");
        Ok(())
    }

    /// Change the caller's own password. No token is involved.
    pub async fn change_password(
        &self,
        principal: &Principal,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        password::check_policy(new_password).map_err(AppError::BadRequest)?;

        let user = self
            .store
            .find_user_by_id(principal.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let valid =
            password::verify(old_password, &user.password_hash).map_err(AppError::Internal)?;
        if !valid {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let pw_hash = password::hash(new_password).map_err(AppError::Internal)?;
        if !self.store.update_password(user.id, &pw_hash).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}

// Unknown, consumed, expired and wrong-purpose tokens all look the same to callers.
fn token_not_found() -> AppError {
    AppError::NotFound("Invalid or expired token".to_string())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid email address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.co").is_ok());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("two@@example.com").is_err());
        assert!(validate_email("space @example.com").is_err());
        assert!(validate_email("").is_err());
    }
}
