use crate::{
    error::AppError,
    models::{
        AnswerOption, Branch, CreateSurveyRequest, NewBranch, NewResponseDetail,
        NewResponseHeader, NewUser, Question, QuestionKind, ResponseDetail, ResponseHeader,
        ResponseStatus, Role, StoredResponse, Survey, SurveyCatalog, User,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

/// Name of the unique index on `survey_responses.request_number`.
pub const REQUEST_NUMBER_CONSTRAINT: &str = "uq_survey_responses_request_number";

/// Name of the foreign key from `survey_responses.branch_id` to `branches`.
pub const BRANCH_FOREIGN_KEY: &str = "fk_survey_responses_branch";

/// StoreError
///
/// Failures raised by a `Repository`. A request-number collision is kept apart
/// from other database errors so the recorder can retry it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request number {0} is already in use")]
    RequestNumberTaken(String),

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("branch code {0} is already registered")]
    BranchCodeTaken(String),

    #[error("branch {0} does not exist")]
    UnknownBranch(i32),

    #[error("respondent {respondent_id} already completed survey {survey_id}")]
    AlreadyResponded { survey_id: i32, respondent_id: i32 },

    #[error("stored row is inconsistent: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::EmailTaken(_)
            | StoreError::BranchCodeTaken(_)
            | StoreError::UnknownBranch(_)
            | StoreError::AlreadyResponded { .. } => AppError::Validation(err.to_string()),
            _ => AppError::Persistence(err.to_string()),
        }
    }
}

/// Repository Trait
///
/// The persistence contract consumed by the login flow, the survey catalog and the
/// response recorder. Handlers and services only see `Arc<dyn Repository>`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credential Store ---
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError>;

    // --- Branches ---
    async fn create_branch(&self, branch: NewBranch) -> Result<Branch, StoreError>;
    /// Active branches ordered by name.
    async fn active_branches(&self) -> Result<Vec<Branch>, StoreError>;
    async fn find_branch(&self, id: i32) -> Result<Option<Branch>, StoreError>;
    /// Returns the updated branch, or `None` when it does not exist.
    async fn set_branch_active(&self, id: i32, active: bool)
    -> Result<Option<Branch>, StoreError>;
    async fn branch_is_active(&self, id: i32) -> Result<bool, StoreError>;

    // --- Survey Catalog ---
    /// Creates the survey, its questions and their options in one transaction.
    async fn create_survey(
        &self,
        req: &CreateSurveyRequest,
        created_by: i32,
    ) -> Result<i32, StoreError>;
    async fn survey_catalog(&self, survey_id: i32) -> Result<Option<SurveyCatalog>, StoreError>;

    // --- Survey Responses ---
    /// Highest six-digit suffix among request numbers shaped `SOL-{year}-NNNNNN`, or 0.
    async fn max_request_sequence(&self, year: i32) -> Result<i32, StoreError>;
    /// Opens the unit of work a submission is written through.
    async fn begin_response(&self) -> Result<Box<dyn ResponseTransaction>, StoreError>;

    // --- Reports ---
    async fn find_response(&self, request_number: &str)
    -> Result<Option<StoredResponse>, StoreError>;
    /// Completed responses of one survey.
    async fn completed_responses(&self, survey_id: i32) -> Result<Vec<StoredResponse>, StoreError>;
    /// Every response of one respondent, newest first.
    async fn responses_by_respondent(
        &self,
        respondent_id: i32,
    ) -> Result<Vec<StoredResponse>, StoreError>;
}

/// ResponseTransaction
///
/// One open, atomic unit of work. Nothing written through it is visible to other
/// readers until `commit`; `rollback` (or dropping it) discards everything.
#[async_trait]
pub trait ResponseTransaction: Send {
    /// Serialises single-response checks for one (survey, respondent) pair until
    /// the transaction ends.
    async fn lock_respondent(&mut self, survey_id: i32, respondent_id: i32)
    -> Result<(), StoreError>;
    async fn has_completed_response(
        &mut self,
        survey_id: i32,
        respondent_id: i32,
    ) -> Result<bool, StoreError>;
    /// Returns the generated header id.
    async fn insert_header(&mut self, header: &NewResponseHeader) -> Result<i32, StoreError>;
    async fn insert_detail(&mut self, detail: &NewResponseDetail) -> Result<i32, StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Row Mappings ---

#[derive(FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| StoreError::Corrupt(format!("user {} has role {:?}", row.id, row.role)))?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SurveyRow {
    id: i32,
    title: String,
    description: Option<String>,
    created_by: i32,
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
    active: bool,
}

#[derive(FromRow)]
struct BranchRow {
    id: i32,
    code: String,
    name: String,
    address: Option<String>,
    city: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    manager: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            code: row.code,
            name: row.name,
            address: row.address,
            city: row.city,
            phone: row.phone,
            email: row.email,
            manager: row.manager,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct HeaderRow {
    id: i32,
    survey_id: i32,
    respondent_id: i32,
    branch_id: Option<i32>,
    request_number: String,
    attention_type: Option<String>,
    client_name: Option<String>,
    client_phone: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
}

impl TryFrom<HeaderRow> for ResponseHeader {
    type Error = StoreError;

    fn try_from(row: HeaderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ResponseStatus>().map_err(|_| {
            StoreError::Corrupt(format!("response {} has status {:?}", row.id, row.status))
        })?;
        Ok(ResponseHeader {
            id: row.id,
            survey_id: row.survey_id,
            respondent_id: row.respondent_id,
            branch_id: row.branch_id,
            request_number: row.request_number,
            attention_type: row.attention_type,
            client_name: row.client_name,
            client_phone: row.client_phone,
            started_at: row.started_at,
            completed_at: row.completed_at,
            status,
        })
    }
}

#[derive(FromRow)]
struct DetailRow {
    id: i32,
    response_id: i32,
    question_id: i32,
    option_id: Option<i32>,
    free_text: Option<String>,
    answered_at: DateTime<Utc>,
}

const HEADER_COLUMNS: &str = "id, survey_id, respondent_id, branch_id, request_number, \
     attention_type, client_name, client_phone, started_at, completed_at, status";

const BRANCH_COLUMNS: &str =
    "id, code, name, address, city, phone, email, manager, active, created_at";

#[derive(FromRow)]
struct QuestionRow {
    id: i32,
    survey_id: i32,
    text: String,
    kind: String,
    required: bool,
    position: i32,
}

#[derive(FromRow)]
struct OptionRow {
    id: i32,
    question_id: i32,
    text: String,
    value: Option<String>,
    position: i32,
}

/// Classifies an insert error on `survey_responses`.
fn classify_header_error(
    err: sqlx::Error,
    request_number: &str,
    branch_id: Option<i32>,
) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() && db.constraint() == Some(REQUEST_NUMBER_CONSTRAINT) {
            return StoreError::RequestNumberTaken(request_number.to_string());
        }
        if db.is_foreign_key_violation() && db.constraint() == Some(BRANCH_FOREIGN_KEY) {
            if let Some(branch_id) = branch_id {
                return StoreError::UnknownBranch(branch_id);
            }
        }
    }
    StoreError::Database(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_survey_tree(
        tx: &mut Transaction<'static, Postgres>,
        req: &CreateSurveyRequest,
        created_by: i32,
    ) -> Result<i32, sqlx::Error> {
        let survey_id: i32 = sqlx::query_scalar(
            r#"INSERT INTO surveys (title, description, created_by, created_at, deadline, active)
               VALUES ($1, $2, $3, NOW(), $4, true)
               RETURNING id"#,
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(created_by)
        .bind(req.deadline)
        .fetch_one(&mut **tx)
        .await?;

        for question in &req.questions {
            let question_id: i32 = sqlx::query_scalar(
                r#"INSERT INTO questions (survey_id, text, kind, required, position)
                   VALUES ($1, $2, $3, $4, $5)
                   RETURNING id"#,
            )
            .bind(survey_id)
            .bind(&question.text)
            .bind(question.kind.as_str())
            .bind(question.required)
            .bind(question.position)
            .fetch_one(&mut **tx)
            .await?;

            for option in &question.options {
                sqlx::query(
                    r#"INSERT INTO answer_options (question_id, text, value, position)
                       VALUES ($1, $2, $3, $4)"#,
                )
                .bind(question_id)
                .bind(&option.text)
                .bind(&option.value)
                .bind(option.position)
                .execute(&mut **tx)
                .await?;
            }
        }

        Ok(survey_id)
    }

    /// Attaches detail rows to headers with one query, keeping the header order.
    async fn with_details(&self, rows: Vec<HeaderRow>) -> Result<Vec<StoredResponse>, StoreError> {
        let headers = rows
            .into_iter()
            .map(ResponseHeader::try_from)
            .collect::<Result<Vec<_>, StoreError>>()?;
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = headers.iter().map(|h| h.id).collect();

        let detail_rows = sqlx::query_as::<_, DetailRow>(
            r#"SELECT id, response_id, question_id, option_id, free_text, answered_at
               FROM response_details
               WHERE response_id = ANY($1)
               ORDER BY id"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_header: HashMap<i32, Vec<ResponseDetail>> = HashMap::new();
        for row in detail_rows {
            by_header.entry(row.response_id).or_default().push(ResponseDetail {
                id: row.id,
                header_id: row.response_id,
                question_id: row.question_id,
                selected_option_id: row.option_id,
                free_text: row.free_text,
                answered_at: row.answered_at,
            });
        }

        Ok(headers
            .into_iter()
            .map(|header| StoredResponse {
                details: by_header.remove(&header.id).unwrap_or_default(),
                header,
            })
            .collect())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_user_by_email
    ///
    /// Looks up the credential record used by the login flow. Inactive users are
    /// returned too; the caller decides what to do with them.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, name, email, password_hash, role, active, created_at
               FROM users
               WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// create_user
    ///
    /// Inserts a new credential record. A unique violation on `email` is reported
    /// as `EmailTaken`.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"INSERT INTO users (name, email, password_hash, role, active, created_at)
               VALUES ($1, $2, $3, $4, true, NOW())
               RETURNING id, name, email, password_hash, role, active, created_at"#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::EmailTaken(user.email.clone())
            } else {
                StoreError::Database(e)
            }
        })?;

        row.try_into()
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, name, email, password_hash, role, active, created_at
               FROM users
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// create_branch
    ///
    /// A unique violation on `code` is reported as `BranchCodeTaken`.
    async fn create_branch(&self, branch: NewBranch) -> Result<Branch, StoreError> {
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            r#"INSERT INTO branches (code, name, address, city, phone, email, manager, active, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, true, NOW())
               RETURNING {BRANCH_COLUMNS}"#
        ))
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.city)
        .bind(&branch.phone)
        .bind(&branch.email)
        .bind(&branch.manager)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::BranchCodeTaken(branch.code.clone())
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(row.into())
    }

    async fn active_branches(&self) -> Result<Vec<Branch>, StoreError> {
        let rows = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE active ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Branch::from).collect())
    }

    async fn find_branch(&self, id: i32) -> Result<Option<Branch>, StoreError> {
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Branch::from))
    }

    async fn set_branch_active(
        &self,
        id: i32,
        active: bool,
    ) -> Result<Option<Branch>, StoreError> {
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            "UPDATE branches SET active = $2 WHERE id = $1 RETURNING {BRANCH_COLUMNS}"
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Branch::from))
    }

    async fn branch_is_active(&self, id: i32) -> Result<bool, StoreError> {
        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND active)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    /// create_survey
    ///
    /// Writes the survey, questions and options inside one transaction; any failure
    /// rolls the whole tree back.
    async fn create_survey(
        &self,
        req: &CreateSurveyRequest,
        created_by: i32,
    ) -> Result<i32, StoreError> {
        let mut tx = self.pool.begin().await?;
        match Self::insert_survey_tree(&mut tx, req, created_by).await {
            Ok(survey_id) => {
                tx.commit().await?;
                Ok(survey_id)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("create_survey rollback error: {:?}", rollback_err);
                }
                Err(StoreError::Database(e))
            }
        }
    }

    /// survey_catalog
    ///
    /// Loads one survey with its questions and options as flat, id-keyed collections.
    async fn survey_catalog(&self, survey_id: i32) -> Result<Option<SurveyCatalog>, StoreError> {
        let Some(survey) = sqlx::query_as::<_, SurveyRow>(
            r#"SELECT id, title, description, created_by, created_at, deadline, active
               FROM surveys
               WHERE id = $1"#,
        )
        .bind(survey_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, survey_id, text, kind, required, position
               FROM questions
               WHERE survey_id = $1
               ORDER BY position, id"#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;

        let option_rows = sqlx::query_as::<_, OptionRow>(
            r#"SELECT o.id, o.question_id, o.text, o.value, o.position
               FROM answer_options o
               JOIN questions q ON o.question_id = q.id
               WHERE q.survey_id = $1
               ORDER BY o.position, o.id"#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;

        let questions = question_rows
            .into_iter()
            .map(|row| {
                let kind = row.kind.parse::<QuestionKind>().map_err(|_| {
                    StoreError::Corrupt(format!("question {} has kind {:?}", row.id, row.kind))
                })?;
                Ok(Question {
                    id: row.id,
                    survey_id: row.survey_id,
                    text: row.text,
                    kind,
                    required: row.required,
                    position: row.position,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let options = option_rows
            .into_iter()
            .map(|row| AnswerOption {
                id: row.id,
                question_id: row.question_id,
                text: row.text,
                value: row.value,
                position: row.position,
            })
            .collect();

        let survey = Survey {
            id: survey.id,
            title: survey.title,
            description: survey.description,
            created_by: survey.created_by,
            created_at: survey.created_at,
            deadline: survey.deadline,
            active: survey.active,
        };

        Ok(Some(SurveyCatalog::new(survey, questions, options)))
    }

    /// max_request_sequence
    ///
    /// Plain read with no lock: two concurrent callers may observe the same maximum.
    /// A suffix that is not numeric makes the cast fail, and the caller then falls
    /// back to a timestamp number.
    async fn max_request_sequence(&self, year: i32) -> Result<i32, StoreError> {
        let max: i32 = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX(CAST(RIGHT(request_number, 6) AS INTEGER)), 0)
               FROM survey_responses
               WHERE request_number LIKE $1"#,
        )
        .bind(format!("SOL-{year}-%"))
        .fetch_one(&self.pool)
        .await?;
        Ok(max)
    }

    async fn begin_response(&self) -> Result<Box<dyn ResponseTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgResponseTransaction { tx }))
    }

    async fn find_response(
        &self,
        request_number: &str,
    ) -> Result<Option<StoredResponse>, StoreError> {
        let rows = sqlx::query_as::<_, HeaderRow>(&format!(
            "SELECT {HEADER_COLUMNS} FROM survey_responses WHERE request_number = $1"
        ))
        .bind(request_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(self.with_details(rows).await?.into_iter().next())
    }

    async fn completed_responses(&self, survey_id: i32) -> Result<Vec<StoredResponse>, StoreError> {
        let rows = sqlx::query_as::<_, HeaderRow>(&format!(
            "SELECT {HEADER_COLUMNS} FROM survey_responses
             WHERE survey_id = $1 AND status = 'completed'
             ORDER BY id"
        ))
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_details(rows).await
    }

    async fn responses_by_respondent(
        &self,
        respondent_id: i32,
    ) -> Result<Vec<StoredResponse>, StoreError> {
        let rows = sqlx::query_as::<_, HeaderRow>(&format!(
            "SELECT {HEADER_COLUMNS} FROM survey_responses
             WHERE respondent_id = $1
             ORDER BY started_at DESC, id DESC"
        ))
        .bind(respondent_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_details(rows).await
    }
}

/// PgResponseTransaction
///
/// A `ResponseTransaction` over a live Postgres transaction. Dropping it without
/// commit rolls back.
pub struct PgResponseTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ResponseTransaction for PgResponseTransaction {
    /// Transaction-scoped advisory lock keyed on the pair. A concurrent submitter
    /// blocks here until this transaction ends, then sees its committed header.
    async fn lock_respondent(
        &mut self,
        survey_id: i32,
        respondent_id: i32,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(survey_id)
            .bind(respondent_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn has_completed_response(
        &mut self,
        survey_id: i32,
        respondent_id: i32,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(
                   SELECT 1 FROM survey_responses
                   WHERE survey_id = $1 AND respondent_id = $2 AND status = 'completed'
               )"#,
        )
        .bind(survey_id)
        .bind(respondent_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_header(&mut self, header: &NewResponseHeader) -> Result<i32, StoreError> {
        sqlx::query_scalar(
            r#"INSERT INTO survey_responses
                   (survey_id, respondent_id, branch_id, request_number, attention_type,
                    client_name, client_phone, started_at, completed_at, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id"#,
        )
        .bind(header.survey_id)
        .bind(header.respondent_id)
        .bind(header.branch_id)
        .bind(&header.request_number)
        .bind(&header.attention_type)
        .bind(&header.client_name)
        .bind(&header.client_phone)
        .bind(header.started_at)
        .bind(header.completed_at)
        .bind(header.status.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| classify_header_error(e, &header.request_number, header.branch_id))
    }

    async fn insert_detail(&mut self, detail: &NewResponseDetail) -> Result<i32, StoreError> {
        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO response_details
                   (response_id, question_id, option_id, free_text, answered_at)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id"#,
        )
        .bind(detail.header_id)
        .bind(detail.question_id)
        .bind(detail.selected_option_id)
        .bind(&detail.free_text)
        .bind(detail.answered_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
