use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Advisor Router Module
///
/// Survey submission. Mounted behind an `AuthGate` whose allow-list is `[advisor]`.
pub fn advisor_routes() -> Router<AppState> {
    Router::new()
        // POST /api/surveys/{id}/responses
        // Records a submission atomically and returns its request number.
        .route(
            "/api/surveys/{id}/responses",
            post(handlers::submit_response),
        )
}
