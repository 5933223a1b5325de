use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that run without any gate: the liveness check and the login that
/// hands out tokens.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers; returns "ok" without touching the store.
        .route("/health", get(|| async { "ok" }))
        // POST /api/login
        // Exchanges credentials for a signed token.
        .route("/api/login", post(handlers::login))
}
