pub mod rpc;
pub mod send;

use axum::Router;
use axum::routing::post;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/rpc/{operation}", post(rpc::dispatch))
        .route("/api/send", post(send::send))
}
