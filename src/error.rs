use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppError
///
/// The single error taxonomy shared by the token service, the authorization gate,
/// the recorder and the handlers. Each variant maps to exactly one HTTP status.
///
/// The `message` rendered to the client is deliberately coarse: authentication
/// failures never say whether the token was expired, forged or malformed, and
/// persistence failures never leak driver output.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid startup configuration (JWT settings, database URL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing, malformed, expired or forged credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated identity whose role is not on the allow-list.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed payload or a cross-entity reference that does not line up.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced resource (survey) does not exist or is inactive.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage or transaction failure. Any open transaction has already been rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) | AppError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// The text sent to the client. Internal failures are replaced with a generic line.
    fn public_message(&self) -> String {
        match self {
            AppError::Configuration(_) | AppError::Persistence(_) => {
                "Internal server error".to_string()
            }
            AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.public_message() }))).into_response()
    }
}
