pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod models;
pub mod notify;
pub mod rate_limit;
pub mod routes;
pub mod rpc;
pub mod service;
pub mod state;
pub mod store;
pub mod tokens;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use chrono::TimeDelta;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::session::JwtSessions;
use crate::clock::Clock;
use crate::config::Config;
use crate::email::SystemMailer;
use crate::notify::Notifier;
use crate::rate_limit::LoginRateLimiter;
use crate::service::{AccountPolicy, AccountService};
use crate::state::{AppState, SharedState};
use crate::store::CredentialStore;

/// Wire the account service and its collaborators into shared state.
pub fn build_state(
    config: Config,
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
) -> SharedState {
    let system_mailer = config.smtp.as_ref().and_then(|smtp| {
        match SystemMailer::new(smtp) {
            Ok(mailer) => {
                tracing::info!("System SMTP configured");
                Some(Arc::new(mailer))
            }
            Err(e) => {
                tracing::warn!("System SMTP not available: {e}");
                None
            }
        }
    });

    let policy = AccountPolicy {
        token_ttl: TimeDelta::minutes(config.token_ttl_minutes),
        reveal_accounts: config.reveal_accounts,
    };
    let accounts = AccountService::new(store, notifier, clock, policy);
    let sessions = Arc::new(JwtSessions::new(
        config.jwt_secret.clone(),
        TimeDelta::minutes(config.session_ttl_minutes),
    ));

    Arc::new(AppState {
        config,
        accounts,
        sessions,
        system_mailer,
        login_limiter: LoginRateLimiter::default(),
    })
}

pub fn build_app(state: SharedState) -> Router {
    // Security headers
    let headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(headers)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
