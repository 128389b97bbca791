use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::models::TokenPurpose;
use crate::notify::Notification;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|presented| bool::from(presented.as_bytes().ct_eq(secret.as_bytes())))
}

/// Link the user follows from the email.
pub fn action_url(base_url: &str, purpose: TokenPurpose, token: &str) -> String {
    let page = match purpose {
        TokenPurpose::VerifyEmail => "verify-email",
        TokenPurpose::ResetPassword => "forgot-password",
    };
    format!("{}/{page}?token={token}", base_url.trim_end_matches('/'))
}

/// Renders and delivers a token email on behalf of the notifier.
pub async fn send(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    if !authorized(&headers, &state.config.notify_secret) {
        return Err(AppError::Unauthorized("Invalid notify secret".to_string()));
    }

    let req: Notification = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid notification: {e}")))?;

    if req.email.is_empty() || !req.email.contains('@') || req.token.is_empty() {
        return Err(AppError::BadRequest("email and token are required".to_string()));
    }

    let url = action_url(&state.config.base_url, req.purpose, &req.token);
    let ttl_minutes = state.config.token_ttl_minutes;

    let Some(mailer) = state.system_mailer.as_ref() else {
        tracing::warn!("System SMTP not configured. {:?} link for {}: {url}", req.purpose, req.email);
        return Ok(Json(MessageResponse {
            message: "Email logged".to_string(),
        }));
    };

    mailer
        .send_token(&req.email, req.purpose, &url, ttl_minutes)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(MessageResponse {
        message: "Email sent".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn links_point_at_purpose_pages() {
        assert_eq!(
            action_url("https://app.test/", TokenPurpose::VerifyEmail, "abc"),
            "https://app.test/verify-email?token=abc"
        );
        assert_eq!(
            action_url("https://app.test", TokenPurpose::ResetPassword, "abc"),
            "https://app.test/forgot-password?token=abc"
        );
    }

    #[test]
    fn secret_must_match_exactly() {
        let mut headers = HeaderMap::new();
        assert!(!authorized(&headers, "s3cret"));

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cre"));
        assert!(!authorized(&headers, "s3cret"));

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(authorized(&headers, "s3cret"));
    }
}
