use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{Role, Token, TokenPurpose, User};
use crate::store::{CredentialStore, StoreError, TokenEffect};

/// In-process store for development and tests. Data is lost on restart.
pub struct MemoryStore {
    inner: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// email -> user id
    emails: HashMap<String, Uuid>,
    /// token hash -> token
    tokens: HashMap<String, Token>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
            clock,
        }
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn tokens_for_user(&self, user_id: Uuid) -> Vec<Token> {
        self.inner
            .lock()
            .await
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let mut tables = self.inner.lock().await;
        if tables.emails.contains_key(email) {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }

        let user = User {
            id: Uuid::now_v7(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            email_verified_at: None,
            password_changed_at: None,
            created_at: self.clock.now(),
        };
        tables.emails.insert(user.email.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.inner.lock().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        user.password_changed_at = Some(self.clock.now());
        Ok(true)
    }

    async fn insert_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        purpose: TokenPurpose,
        ttl: TimeDelta,
    ) -> Result<Token, StoreError> {
        let mut tables = self.inner.lock().await;
        if tables.tokens.contains_key(token_hash) {
            return Err(StoreError::Conflict("Token already exists".to_string()));
        }

        let now = self.clock.now();
        let token = Token {
            token_hash: token_hash.to_string(),
            user_id,
            purpose,
            expires_at: now + ttl,
            created_at: now,
        };
        tables.tokens.insert(token.token_hash.clone(), token.clone());
        Ok(token)
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.inner.lock().await.tokens.get(token_hash).cloned())
    }

    async fn consume_token(
        &self,
        token_hash: &str,
        effect: TokenEffect<'_>,
    ) -> Result<Option<Uuid>, StoreError> {
        // Held across the check and both writes.
        let mut tables = self.inner.lock().await;
        let now = self.clock.now();

        let user_id = match tables.tokens.get(token_hash) {
            Some(token) if token.purpose == effect.purpose() && token.is_live(now) => token.user_id,
            _ => return Ok(None),
        };

        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        match effect {
            TokenEffect::VerifyEmail => user.email_verified_at = Some(now),
            TokenEffect::ResetPassword { password_hash } => {
                user.password_hash = password_hash.to_string();
                user.password_changed_at = Some(now);
            }
        }

        if let Some(token) = tables.tokens.get_mut(token_hash) {
            token.expires_at = now;
        }
        Ok(Some(user_id))
    }
}
