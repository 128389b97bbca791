use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde_json::{Value, json};

use crate::auth::extractor::MaybePrincipal;
use crate::auth::gate;
use crate::auth::session::SESSION_COOKIE;
use crate::error::AppError;
use crate::rpc::{self, Operation};
use crate::state::SharedState;

fn session_cookie(token: &str, max_age_minutes: i64) -> CookieJar {
    let session = Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(max_age_minutes))
        .build();

    CookieJar::new().add(session)
}

pub async fn dispatch(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    MaybePrincipal(principal): MaybePrincipal,
    body: Bytes,
) -> Result<Response, AppError> {
    let op = Operation::from_name(&name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown operation: {name}")))?;

    let access = gate::authorize(op.tier(), principal)?;

    let input: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
    };

    let outcome = rpc::execute(&state, op, access, input).await?;
    let response = Json(json!({ "result": outcome.result }));

    Ok(match outcome.session {
        Some(token) => {
            let jar = session_cookie(&token, state.sessions.ttl().num_minutes());
            (jar, response).into_response()
        }
        None => response.into_response(),
    })
}
