use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use chrono::TimeDelta;

use crate::auth::Principal;
use crate::auth::jwt::{self, Claims};

pub const SESSION_COOKIE: &str = "session";

/// Resolves the caller of a request and mints sessions after login.
pub trait SessionProvider: Send + Sync {
    /// `None` for anonymous callers, including ones presenting an invalid session.
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;

    fn issue(&self, principal: &Principal) -> Result<String, String>;

    fn ttl(&self) -> TimeDelta;
}

/// Signed JWT sessions read from a Bearer header or the session cookie.
pub struct JwtSessions {
    secret: String,
    ttl: TimeDelta,
}

impl JwtSessions {
    pub fn new(secret: impl Into<String>, ttl: TimeDelta) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    fn principal_from(&self, token: &str) -> Option<Principal> {
        match jwt::decode_token(token, &self.secret) {
            Ok(claims) => Some(Principal {
                id: claims.sub,
                role: claims.role,
            }),
            Err(e) => {
                tracing::debug!("Ignoring session token: {e}");
                None
            }
        }
    }
}

impl SessionProvider for JwtSessions {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        // Bearer token first
        if let Some(token) = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        {
            return self.principal_from(token);
        }

        let jar = CookieJar::from_headers(headers);
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| self.principal_from(cookie.value()))
    }

    fn issue(&self, principal: &Principal) -> Result<String, String> {
        let claims = Claims::new(principal.id, principal.role, self.ttl);
        jwt::encode_token(&claims, &self.secret)
    }

    fn ttl(&self) -> TimeDelta {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use uuid::Uuid;

    use super::*;
    use crate::models::Role;

    fn sessions() -> JwtSessions {
        JwtSessions::new("test-secret", TimeDelta::minutes(30))
    }

    #[test]
    fn resolves_bearer_header() {
        let sessions = sessions();
        let principal = Principal { id: Uuid::now_v7(), role: Role::Admin };
        let token = sessions.issue(&principal).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(sessions.resolve(&headers), Some(principal));
    }

    #[test]
    fn resolves_cookie() {
        let sessions = sessions();
        let principal = Principal { id: Uuid::now_v7(), role: Role::User };
        let token = sessions.issue(&principal).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).unwrap(),
        );
        assert_eq!(sessions.resolve(&headers), Some(principal));
    }

    #[test]
    fn garbage_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer nope"));
        assert_eq!(sessions().resolve(&headers), None);
        assert_eq!(sessions().resolve(&HeaderMap::new()), None);
    }
}
