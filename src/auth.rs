use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::{Identity, Role},
    token::TokenService,
};

const MSG_TOKEN_REQUIRED: &str = "Authorization token required";
const MSG_TOKEN_INVALID: &str = "Invalid token";
pub(crate) const MSG_FORBIDDEN: &str = "You do not have permission for this operation";

/// AuthGate
///
/// The authorization interceptor every protected router is composed with. The role
/// allow-list is fixed when the gate is built for a router group; an empty list
/// admits any authenticated identity.
///
/// A single failed check ends the request. There are no retries or fallbacks.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenService>,
    allowed_roles: Arc<HashSet<Role>>,
}

impl AuthGate {
    /// Admits any identity holding a valid token.
    pub fn any_role(tokens: Arc<TokenService>) -> Self {
        Self::with_roles(tokens, Vec::<Role>::new())
    }

    pub fn with_roles(tokens: Arc<TokenService>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            tokens,
            allowed_roles: Arc::new(roles.into_iter().collect()),
        }
    }

    /// check
    ///
    /// Runs the gate against a raw `Authorization` header value:
    /// 1. The header must exist and its scheme must be exactly `Bearer`.
    ///    Otherwise the token is never parsed.
    /// 2. The token parameter must validate.
    /// 3. If the allow-list is non-empty, the identity's role must be on it.
    pub fn check(&self, authorization: Option<&HeaderValue>) -> Result<Identity, AppError> {
        let token = authorization
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_parameter)
            .ok_or_else(|| AppError::Unauthenticated(MSG_TOKEN_REQUIRED.to_string()))?;

        let identity = self
            .tokens
            .validate(token)
            .ok_or_else(|| AppError::Unauthenticated(MSG_TOKEN_INVALID.to_string()))?;

        if !self.allowed_roles.is_empty() && !self.allowed_roles.contains(&identity.role) {
            tracing::debug!(
                subject = identity.subject_id,
                role = %identity.role,
                "role not on allow-list"
            );
            return Err(AppError::Forbidden(MSG_FORBIDDEN.to_string()));
        }

        Ok(identity)
    }
}

/// Splits `"<scheme> <parameter>"` and returns the parameter when the scheme is
/// exactly `Bearer`.
fn bearer_parameter(value: &str) -> Option<&str> {
    let (scheme, parameter) = value.split_once(' ')?;
    (scheme == "Bearer").then(|| parameter.trim())
}

/// authorize
///
/// Middleware adapter for `AuthGate`. On success the verified `Identity` is
/// published into the request extensions for the handler; on failure the
/// request short-circuits with 401 or 403.
pub async fn authorize(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = gate.check(request.headers().get(header::AUTHORIZATION))?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// AuthUser
///
/// Handler-side extractor for the identity published by `authorize`. If a handler
/// is mounted without the gate, the extension is absent and the request is
/// rejected as unauthenticated.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthenticated(MSG_TOKEN_REQUIRED.to_string()))
    }
}
