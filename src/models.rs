use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::AppError;

// --- Identity & Credentials ---

/// Role
///
/// The RBAC tag carried in every token. Serialized in lowercase on the wire,
/// in the token claims and in the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Administrator,
    Advisor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Advisor => "advisor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Role::Administrator),
            "advisor" => Ok(Role::Advisor),
            other => Err(AppError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Identity
///
/// The authenticated subject. Built from a credential record at login, embedded
/// verbatim into the token, and recovered unchanged by token validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Identity {
    pub subject_id: i32,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

/// User
///
/// A credential record from the `users` table. The password hash never leaves the
/// server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            subject_id: self.id,
            display_name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// NewUser
///
/// Insert payload for the credential store; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

// --- Survey Catalog ---

/// QuestionKind
///
/// Decides which answer shape a question accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    FreeText,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::FreeText => "free_text",
        }
    }
}

impl FromStr for QuestionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_choice" => Ok(QuestionKind::SingleChoice),
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "free_text" => Ok(QuestionKind::FreeText),
            other => Err(AppError::Validation(format!("unknown question kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Survey {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub created_by: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub deadline: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Question {
    pub id: i32,
    pub survey_id: i32,
    pub text: String,
    pub kind: QuestionKind,
    pub required: bool,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AnswerOption {
    pub id: i32,
    pub question_id: i32,
    pub text: String,
    pub value: Option<String>,
    pub position: i32,
}

/// SurveyCatalog
///
/// Flat, id-keyed view of one survey and everything that hangs off it. Entities
/// reference each other by id only; navigation goes through the lookup methods.
#[derive(Debug, Clone)]
pub struct SurveyCatalog {
    pub survey: Survey,
    pub questions: HashMap<i32, Question>,
    pub options: HashMap<i32, AnswerOption>,
}

impl SurveyCatalog {
    pub fn new(survey: Survey, questions: Vec<Question>, options: Vec<AnswerOption>) -> Self {
        Self {
            survey,
            questions: questions.into_iter().map(|q| (q.id, q)).collect(),
            options: options.into_iter().map(|o| (o.id, o)).collect(),
        }
    }

    /// Returns the question only if it belongs to this survey.
    pub fn question(&self, id: i32) -> Option<&Question> {
        self.questions
            .get(&id)
            .filter(|q| q.survey_id == self.survey.id)
    }

    pub fn option(&self, id: i32) -> Option<&AnswerOption> {
        self.options.get(&id)
    }

    /// Options of one question, ordered by position.
    pub fn options_of(&self, question_id: i32) -> Vec<&AnswerOption> {
        let mut options: Vec<_> = self
            .options
            .values()
            .filter(|o| o.question_id == question_id)
            .collect();
        options.sort_by_key(|o| (o.position, o.id));
        options
    }

    /// Questions ordered by position.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<_> = self.questions.values().collect();
        questions.sort_by_key(|q| (q.position, q.id));
        questions
    }

    pub fn view(&self) -> SurveyView {
        SurveyView {
            survey: self.survey.clone(),
            questions: self
                .ordered_questions()
                .into_iter()
                .map(|q| QuestionView {
                    question: q.clone(),
                    options: self.options_of(q.id).into_iter().cloned().collect(),
                })
                .collect(),
        }
    }
}

// --- Branches ---

/// Branch
///
/// A service location a submission can be attributed to. `code` is unique and
/// stored upper-case.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Branch {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager: Option<String>,
    pub active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a branch, already normalised.
#[derive(Debug, Clone)]
pub struct NewBranch {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager: Option<String>,
}

// --- Survey Responses ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ResponseStatus {
    Started,
    Completed,
    Abandoned,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Started => "started",
            ResponseStatus::Completed => "completed",
            ResponseStatus::Abandoned => "abandoned",
        }
    }
}

impl FromStr for ResponseStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(ResponseStatus::Started),
            "completed" => Ok(ResponseStatus::Completed),
            "abandoned" => Ok(ResponseStatus::Abandoned),
            other => Err(AppError::Validation(format!("unknown response status: {other}"))),
        }
    }
}

/// ResponseHeader
///
/// One submission. Owns its detail rows (cascade delete in the schema).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResponseHeader {
    pub id: i32,
    pub survey_id: i32,
    pub respondent_id: i32,
    pub branch_id: Option<i32>,
    pub request_number: String,
    pub attention_type: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ResponseStatus,
}

/// ResponseDetail
///
/// One answered option (or one free-text answer) of a submission.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResponseDetail {
    pub id: i32,
    pub header_id: i32,
    pub question_id: i32,
    pub selected_option_id: Option<i32>,
    pub free_text: Option<String>,
    #[ts(type = "string")]
    pub answered_at: DateTime<Utc>,
}

/// Insert payload for a response header; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewResponseHeader {
    pub survey_id: i32,
    pub respondent_id: i32,
    pub branch_id: Option<i32>,
    pub request_number: String,
    pub attention_type: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ResponseStatus,
}

/// Insert payload for a detail row, bound to an already inserted header.
#[derive(Debug, Clone)]
pub struct NewResponseDetail {
    pub header_id: i32,
    pub question_id: i32,
    pub selected_option_id: Option<i32>,
    pub free_text: Option<String>,
    pub answered_at: DateTime<Utc>,
}

/// A committed submission loaded back with its detail rows.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub header: ResponseHeader,
    pub details: Vec<ResponseDetail>,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub name: String,
    pub id: i32,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// RegisterUserRequest
///
/// Administrator-only. The password is hashed before it reaches the store and is
/// never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateSurveyRequest {
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string | null")]
    pub deadline: Option<DateTime<Utc>>,
    pub questions: Vec<CreateQuestionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateQuestionRequest {
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_position")]
    pub position: i32,
    #[serde(default)]
    pub options: Vec<CreateOptionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateOptionRequest {
    pub text: String,
    pub value: Option<String>,
    #[serde(default = "default_position")]
    pub position: i32,
}

fn default_position() -> i32 {
    1
}

impl CreateSurveyRequest {
    /// Shape checks that do not need the store.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("survey title is required".to_string()));
        }
        if self.questions.is_empty() {
            return Err(AppError::Validation(
                "a survey needs at least one question".to_string(),
            ));
        }
        for (idx, question) in self.questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "question #{} has no text",
                    idx + 1
                )));
            }
            match question.kind {
                QuestionKind::FreeText if !question.options.is_empty() => {
                    return Err(AppError::Validation(format!(
                        "free-text question #{} cannot have options",
                        idx + 1
                    )));
                }
                QuestionKind::SingleChoice | QuestionKind::MultipleChoice
                    if question.options.is_empty() =>
                {
                    return Err(AppError::Validation(format!(
                        "choice question #{} needs at least one option",
                        idx + 1
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedSurvey {
    pub id: i32,
}

/// SubmitResponseRequest
///
/// One survey submission. `request_number` is optional; when absent one is
/// generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitResponseRequest {
    pub branch_id: Option<i32>,
    pub request_number: Option<String>,
    pub attention_type: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub answers: Vec<AnswerRequest>,
}

/// AnswerRequest
///
/// Wire form of one answer. Exactly one of the three answer fields must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AnswerRequest {
    pub question_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_options: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text: Option<String>,
}

/// Answer
///
/// The validated shape of one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Option ids, de-duplicated, in first-seen order.
    MultiSelect(Vec<i32>),
    SingleSelect(i32),
    FreeText(String),
}

impl AnswerRequest {
    pub fn answer(&self) -> Result<Answer, AppError> {
        let multi = self
            .selected_options
            .as_ref()
            .filter(|ids| !ids.is_empty());
        let text = self
            .free_text
            .as_ref()
            .filter(|t| !t.trim().is_empty());

        match (multi, self.selected_option, text) {
            (Some(ids), None, None) => {
                let mut unique = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(id) {
                        unique.push(*id);
                    }
                }
                Ok(Answer::MultiSelect(unique))
            }
            (None, Some(id), None) => Ok(Answer::SingleSelect(id)),
            (None, None, Some(text)) => Ok(Answer::FreeText(text.clone())),
            (None, None, None) => Err(AppError::Validation(format!(
                "answer for question {} is empty",
                self.question_id
            ))),
            _ => Err(AppError::Validation(format!(
                "answer for question {} must set exactly one of selected_options, selected_option, free_text",
                self.question_id
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmitResponseResult {
    pub request_number: String,
}

/// CreateBranchRequest
///
/// Administrator-only. `code` is trimmed and upper-cased before it is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateBranchRequest {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub manager: Option<String>,
}

impl CreateBranchRequest {
    /// Trims every field, upper-cases the code and drops blank optionals.
    pub fn normalize(&self) -> Result<NewBranch, AppError> {
        let code = self.code.trim().to_uppercase();
        let name = self.name.trim();
        if code.is_empty() {
            return Err(AppError::Validation("branch code is required".to_string()));
        }
        if code.chars().count() > 10 {
            return Err(AppError::Validation(
                "branch code is at most 10 characters".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(AppError::Validation("branch name is required".to_string()));
        }
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Ok(NewBranch {
            code,
            name: name.to_string(),
            address: optional(&self.address),
            city: optional(&self.city),
            phone: optional(&self.phone),
            email: optional(&self.email),
            manager: optional(&self.manager),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BranchStatusRequest {
    pub active: bool,
}

// --- Output Views ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SurveyView {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<QuestionView>,
}

// --- Reports ---

/// One detail row resolved against the survey catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AnswerReport {
    pub question_id: i32,
    pub question_text: String,
    pub kind: QuestionKind,
    pub position: i32,
    pub option_id: Option<i32>,
    pub option_text: Option<String>,
    pub option_value: Option<String>,
    pub free_text: Option<String>,
    #[ts(type = "string")]
    pub answered_at: DateTime<Utc>,
}

/// ResponseReport
///
/// A submission with its header, the names it references and its answers in
/// question order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResponseReport {
    pub request_number: String,
    pub survey_id: i32,
    pub survey_title: String,
    pub respondent_id: i32,
    pub respondent_name: Option<String>,
    pub branch_id: Option<i32>,
    pub branch_name: Option<String>,
    pub attention_type: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ResponseStatus,
    pub answers: Vec<AnswerReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OptionStatistics {
    pub option_id: i32,
    pub text: String,
    pub value: Option<String>,
    pub count: usize,
    /// Share of completed responses that picked this option, two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuestionStatistics {
    pub question_id: i32,
    pub text: String,
    pub kind: QuestionKind,
    /// Detail rows recorded for the question.
    pub total_answers: usize,
    /// Empty for free-text questions.
    pub options: Vec<OptionStatistics>,
    /// Empty for choice questions.
    pub text_answers: Vec<String>,
}

/// SurveyStatistics
///
/// Per-question tallies over the completed responses of one survey.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SurveyStatistics {
    pub survey_id: i32,
    pub title: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub total_responses: usize,
    pub questions: Vec<QuestionStatistics>,
}
