use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod password;
pub mod recorder;
pub mod reports;
pub mod repository;
pub mod request_number;
pub mod token;

// Routers grouped by the gate they sit behind.
pub mod routes;
use auth::{AuthGate, authorize};
use models::Role;
use routes::{admin, advisor, authenticated, public};

// --- Public Re-exports ---

pub use config::{AppConfig, JwtConfig};
pub use error::AppError;
pub use memory::MemoryRepository;
pub use recorder::{RecorderPolicy, SurveyResponseRecorder};
pub use reports::ReportService;
pub use repository::{PostgresRepository, RepositoryState};
pub use token::TokenService;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register_user, handlers::get_me,
        handlers::create_survey, handlers::get_survey, handlers::submit_response,
        handlers::create_branch, handlers::list_branches, handlers::get_branch,
        handlers::set_branch_status, handlers::get_response, handlers::my_responses,
        handlers::survey_statistics
    ),
    components(
        schemas(
            models::Role, models::Identity, models::LoginRequest, models::LoginResponse,
            models::RegisterUserRequest, models::UserProfile, models::QuestionKind,
            models::Survey, models::Question, models::AnswerOption,
            models::CreateSurveyRequest, models::CreateQuestionRequest,
            models::CreateOptionRequest, models::CreatedSurvey, models::SurveyView,
            models::QuestionView, models::SubmitResponseRequest, models::AnswerRequest,
            models::SubmitResponseResult, models::Branch, models::CreateBranchRequest,
            models::BranchStatusRequest, models::ResponseStatus, models::ResponseReport,
            models::AnswerReport, models::SurveyStatistics, models::QuestionStatistics,
            models::OptionStatistics,
        )
    ),
    tags(
        (name = "survey-gate", description = "Survey authentication and response recording API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cheaply clonable container shared by every request. Services are
/// built once from the immutable `AppConfig` and injected here.
#[derive(Clone)]
pub struct AppState {
    /// Credential store, survey catalog and response persistence.
    pub repo: RepositoryState,
    /// Issues and validates identity tokens.
    pub tokens: Arc<TokenService>,
    /// Atomic survey submission writer.
    pub recorder: Arc<SurveyResponseRecorder>,
    /// Read side over recorded submissions.
    pub reports: Arc<ReportService>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires the services from configuration. Fails with `AppError::Configuration`
    /// when the JWT settings are unusable.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Result<Self, AppError> {
        let tokens = Arc::new(TokenService::new(config.jwt.clone())?);
        let recorder = Arc::new(SurveyResponseRecorder::new(
            repo.clone(),
            RecorderPolicy {
                single_response_per_respondent: config.single_response_per_respondent,
            },
        ));
        let reports = Arc::new(ReportService::new(repo.clone()));
        Ok(Self {
            repo,
            tokens,
            recorder,
            reports,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(app_state: &AppState) -> Arc<TokenService> {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure. Each protected group is composed with its own
/// `AuthGate`; the allowed roles are fixed here, at registration.
pub fn create_router(state: AppState) -> Router {
    let any_identity = AuthGate::any_role(state.tokens.clone());
    let administrators = AuthGate::with_roles(state.tokens.clone(), [Role::Administrator]);
    let advisors = AuthGate::with_roles(state.tokens.clone(), [Role::Advisor]);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(any_identity, authorize)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(administrators, authorize)),
        )
        .merge(
            advisor::advisor_routes()
                .route_layer(middleware::from_fn_with_state(advisors, authorize)),
        )
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the per-request span: method, uri and the `x-request-id` assigned by
/// `SetRequestIdLayer`, so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
