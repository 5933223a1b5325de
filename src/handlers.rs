use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        Branch, BranchStatusRequest, CreateBranchRequest, CreateSurveyRequest, CreatedSurvey,
        Identity, LoginRequest, LoginResponse, NewUser, RegisterUserRequest, ResponseReport,
        SubmitResponseRequest, SubmitResponseResult, SurveyStatistics, SurveyView,
        UserProfile,
    },
    password,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

const MSG_BAD_CREDENTIALS: &str = "Invalid credentials";

/// login
///
/// [Public Route] Exchanges email + password for a signed token.
///
/// Unknown email, inactive account and wrong password all produce the same 401,
/// so the endpoint does not reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let user = state
        .repo
        .find_user_by_email(email)
        .await?
        .filter(|u| u.active)
        .filter(|u| password::verify_password(&payload.password, &u.password_hash))
        .ok_or_else(|| {
            tracing::info!("login rejected");
            AppError::Unauthenticated(MSG_BAD_CREDENTIALS.to_string())
        })?;

    let now = Utc::now();
    let expires_at = state.tokens.expires_at(now)?;
    let token = state.tokens.issue_at(&user.identity(), now)?;

    tracing::info!(user_id = user.id, role = %user.role, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        role: user.role,
        name: user.name,
        id: user.id,
        expires_at,
    }))
}

/// register_user
///
/// [Administrator Route] Creates a credential record. The password is stored as an
/// Argon2id hash.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 400, description = "Invalid payload or duplicate email"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn register_user(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let name = payload.name.trim();
    let email = payload.email.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }

    let user = state
        .repo
        .create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password::hash_password(&payload.password)?,
            role: payload.role,
        })
        .await?;

    tracing::info!(
        created_by = admin.subject_id,
        user_id = user.id,
        role = %user.role,
        "user registered"
    );
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// get_me
///
/// [Authenticated Route] Returns the identity the authorization gate published for
/// this request.
#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Current identity", body = Identity))
)]
pub async fn get_me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}

/// create_survey
///
/// [Administrator Route] Creates a survey with its questions and options in one
/// transaction.
#[utoipa::path(
    post,
    path = "/api/surveys",
    request_body = CreateSurveyRequest,
    responses(
        (status = 201, description = "Survey created", body = CreatedSurvey),
        (status = 400, description = "Invalid survey definition")
    )
)]
pub async fn create_survey(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<(StatusCode, Json<CreatedSurvey>), AppError> {
    payload.validate()?;
    let id = state.repo.create_survey(&payload, admin.subject_id).await?;
    tracing::info!(survey_id = id, created_by = admin.subject_id, "survey created");
    Ok((StatusCode::CREATED, Json(CreatedSurvey { id })))
}

/// get_survey
///
/// [Authenticated Route] Returns a survey with its ordered questions and options.
#[utoipa::path(
    get,
    path = "/api/surveys/{id}",
    params(("id" = i32, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Survey", body = SurveyView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_survey(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SurveyView>, AppError> {
    let catalog = state
        .repo
        .survey_catalog(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("survey {id} not found")))?;
    Ok(Json(catalog.view()))
}

/// submit_response
///
/// [Advisor Route] Records one survey submission for the authenticated advisor and
/// returns its request number.
#[utoipa::path(
    post,
    path = "/api/surveys/{id}/responses",
    params(("id" = i32, Path, description = "Survey ID")),
    request_body = SubmitResponseRequest,
    responses(
        (status = 200, description = "Response recorded", body = SubmitResponseResult),
        (status = 400, description = "Invalid answers"),
        (status = 404, description = "Survey not found"),
        (status = 500, description = "Storage failure, nothing was written")
    )
)]
pub async fn submit_response(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(survey_id): Path<i32>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<Json<SubmitResponseResult>, AppError> {
    let request_number = state
        .recorder
        .submit(survey_id, identity.subject_id, &payload)
        .await?;
    Ok(Json(SubmitResponseResult { request_number }))
}

// --- Branches ---

/// create_branch
///
/// [Administrator Route] Adds a branch to the catalog. The code is stored
/// upper-case and must be unique.
#[utoipa::path(
    post,
    path = "/api/branches",
    request_body = CreateBranchRequest,
    responses(
        (status = 201, description = "Branch created", body = Branch),
        (status = 400, description = "Invalid payload or duplicate code"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_branch(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<Branch>), AppError> {
    let branch = state.repo.create_branch(payload.normalize()?).await?;
    tracing::info!(
        branch_id = branch.id,
        code = %branch.code,
        created_by = admin.subject_id,
        "branch created"
    );
    Ok((StatusCode::CREATED, Json(branch)))
}

/// list_branches
///
/// [Authenticated Route] Active branches ordered by name, for attributing
/// submissions.
#[utoipa::path(
    get,
    path = "/api/branches",
    responses((status = 200, description = "Active branches", body = Vec<Branch>))
)]
pub async fn list_branches(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Branch>>, AppError> {
    Ok(Json(state.repo.active_branches().await?))
}

#[utoipa::path(
    get,
    path = "/api/branches/{id}",
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Branch", body = Branch),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_branch(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Branch>, AppError> {
    state
        .repo
        .find_branch(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("branch {id} not found")))
}

/// set_branch_status
///
/// [Administrator Route] Activates or deactivates a branch. Inactive branches are
/// hidden from the list and rejected on new submissions; recorded ones keep them.
#[utoipa::path(
    patch,
    path = "/api/branches/{id}",
    params(("id" = i32, Path, description = "Branch ID")),
    request_body = BranchStatusRequest,
    responses(
        (status = 200, description = "Branch updated", body = Branch),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_branch_status(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<BranchStatusRequest>,
) -> Result<Json<Branch>, AppError> {
    let branch = state
        .repo
        .set_branch_active(id, payload.active)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("branch {id} not found")))?;
    tracing::info!(
        branch_id = id,
        active = payload.active,
        changed_by = admin.subject_id,
        "branch status changed"
    );
    Ok(Json(branch))
}

// --- Reports ---

/// get_response
///
/// [Authenticated Route] A recorded submission with its answers, looked up by
/// request number. Advisors only see their own.
#[utoipa::path(
    get,
    path = "/api/responses/{request_number}",
    params(("request_number" = String, Path, description = "Request number, e.g. SOL-2024-000001")),
    responses(
        (status = 200, description = "Response", body = ResponseReport),
        (status = 403, description = "Recorded by another advisor"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_response(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(request_number): Path<String>,
) -> Result<Json<ResponseReport>, AppError> {
    let report = state
        .reports
        .by_request_number(&request_number, &identity)
        .await?;
    Ok(Json(report))
}

/// my_responses
///
/// [Authenticated Route] Submissions recorded by the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/responses",
    responses((status = 200, description = "Own submissions", body = Vec<ResponseReport>))
)]
pub async fn my_responses(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResponseReport>>, AppError> {
    Ok(Json(
        state.reports.respondent_history(identity.subject_id).await?,
    ))
}

/// survey_statistics
///
/// [Administrator Route] Per-question option counts and percentages over the
/// completed responses of a survey.
#[utoipa::path(
    get,
    path = "/api/reports/surveys/{id}",
    params(("id" = i32, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Statistics", body = SurveyStatistics),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn survey_statistics(
    AuthUser(_admin): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SurveyStatistics>, AppError> {
    Ok(Json(state.reports.survey_statistics(id).await?))
}
