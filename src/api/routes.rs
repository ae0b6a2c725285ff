use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let user_routes = Router::new()
        .route("/v1/users", post(handlers::add_user))
        .route("/v1/users/:user_id", delete(handlers::delete_user))
        .route(
            "/v1/users/:user_id/credentials/:provider",
            put(handlers::update_credentials).delete(handlers::delete_credentials),
        );

    let token_routes = Router::new()
        .route(
            "/v1/tokens",
            post(handlers::issue_token).delete(handlers::revoke_token),
        )
        .route("/v1/tokens/verify", post(handlers::verify_token));

    // Internal routes -- probes and operator tooling
    let internal_routes = Router::new()
        .route("/_internal/cluster/status", get(handlers::cluster_status))
        .route("/_internal/health", get(handlers::health));

    Router::new()
        .merge(user_routes)
        .merge(token_routes)
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
