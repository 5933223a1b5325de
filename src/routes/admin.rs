use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Administrator Router Module
///
/// Account and catalog management. Mounted behind an `AuthGate` whose allow-list
/// is `[administrator]`; advisors get 403 before any handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/register
        // Creates a user account (administrator or advisor).
        .route("/api/register", post(handlers::register_user))
        // POST /api/surveys
        // Creates a survey, its questions and options in one transaction.
        .route("/api/surveys", post(handlers::create_survey))
        // POST /api/branches
        // Adds a branch; the code is unique.
        .route("/api/branches", post(handlers::create_branch))
        // PATCH /api/branches/{id}
        // Activates or deactivates a branch.
        .route("/api/branches/{id}", patch(handlers::set_branch_status))
        // GET /api/reports/surveys/{id}
        // Option counts and percentages over completed responses.
        .route("/api/reports/surveys/{id}", get(handlers::survey_statistics))
}
