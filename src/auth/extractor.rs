use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::Principal;
use crate::state::SharedState;

/// The request's principal as resolved by the configured session provider.
/// Never rejects: tier checks happen in [`gate::authorize`](crate::auth::gate::authorize).
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

impl FromRequestParts<SharedState> for MaybePrincipal {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(state.sessions.resolve(&parts.headers)))
    }
}
