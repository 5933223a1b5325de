use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints open to any identity holding a valid token, whatever its role. The
/// router is mounted behind an `AuthGate` with an empty allow-list.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        // Echoes the identity the gate published into the request context.
        .route("/api/me", get(handlers::get_me))
        // GET /api/surveys/{id}
        // Survey definition with ordered questions and options, used to build answers.
        .route("/api/surveys/{id}", get(handlers::get_survey))
        // GET /api/branches, GET /api/branches/{id}
        // Branch lookup for attributing submissions.
        .route("/api/branches", get(handlers::list_branches))
        .route("/api/branches/{id}", get(handlers::get_branch))
        // GET /api/responses
        // The caller's own submissions, newest first.
        .route("/api/responses", get(handlers::my_responses))
        // GET /api/responses/{request_number}
        // One submission with its answers; advisors only see their own.
        .route(
            "/api/responses/{request_number}",
            get(handlers::get_response),
        )
}
