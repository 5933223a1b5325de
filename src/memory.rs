use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    models::{
        AnswerOption, Branch, CreateSurveyRequest, NewBranch, NewResponseDetail,
        NewResponseHeader, NewUser, Question, ResponseDetail, ResponseHeader, ResponseStatus,
        StoredResponse, Survey, SurveyCatalog, User,
    },
    repository::{Repository, ResponseTransaction, StoreError},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    branches: Vec<Branch>,
    surveys: Vec<Survey>,
    questions: Vec<Question>,
    options: Vec<AnswerOption>,
    headers: Vec<ResponseHeader>,
    details: Vec<ResponseDetail>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn has_completed(&self, survey_id: i32, respondent_id: i32) -> bool {
        self.headers.iter().any(|h| {
            h.survey_id == survey_id
                && h.respondent_id == respondent_id
                && h.status == ResponseStatus::Completed
        })
    }

    fn stored(&self, header: &ResponseHeader) -> StoredResponse {
        StoredResponse {
            header: header.clone(),
            details: self
                .details
                .iter()
                .filter(|d| d.header_id == header.id)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Default)]
struct Faults {
    fail_detail_inserts: AtomicBool,
    fail_sequence_query: AtomicBool,
    stale_sequence_reads: AtomicUsize,
}

/// MemoryRepository
///
/// An in-process `Repository` with the same transactional contract as Postgres:
/// response writes are staged per transaction and only become visible on commit.
/// It backs the test-suite and offline demos.
///
/// Fault switches let callers simulate storage failures at precise points.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every detail insert fails once the header of the transaction is written.
    pub fn fail_detail_inserts(&self, fail: bool) {
        self.faults.fail_detail_inserts.store(fail, Ordering::SeqCst);
    }

    /// The request-sequence query fails, forcing the timestamp fallback.
    pub fn fail_sequence_query(&self, fail: bool) {
        self.faults.fail_sequence_query.store(fail, Ordering::SeqCst);
    }

    /// The next `reads` sequence queries report 0, as a reader racing an
    /// uncommitted writer would.
    pub fn stale_sequence_reads(&self, reads: usize) {
        self.faults.stale_sequence_reads.store(reads, Ordering::SeqCst);
    }

    pub async fn set_survey_active(&self, survey_id: i32, active: bool) {
        let mut tables = self.tables.lock().await;
        if let Some(survey) = tables.surveys.iter_mut().find(|s| s.id == survey_id) {
            survey.active = active;
        }
    }

    pub async fn set_user_active(&self, user_id: i32, active: bool) {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.active = active;
        }
    }

    /// Committed response headers.
    pub async fn headers(&self) -> Vec<ResponseHeader> {
        self.tables.lock().await.headers.clone()
    }

    /// Committed response details.
    pub async fn details(&self) -> Vec<ResponseDetail> {
        self.tables.lock().await.details.clone()
    }

    /// Deletes a header together with its details.
    pub async fn delete_response(&self, header_id: i32) -> bool {
        let mut tables = self.tables.lock().await;
        let before = tables.headers.len();
        tables.headers.retain(|h| h.id != header_id);
        tables.details.retain(|d| d.header_id != header_id);
        tables.headers.len() != before
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken(user.email));
        }
        let created = User {
            id: tables.next_id(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            active: true,
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_branch(&self, branch: NewBranch) -> Result<Branch, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.branches.iter().any(|b| b.code == branch.code) {
            return Err(StoreError::BranchCodeTaken(branch.code));
        }
        let created = Branch {
            id: tables.next_id(),
            code: branch.code,
            name: branch.name,
            address: branch.address,
            city: branch.city,
            phone: branch.phone,
            email: branch.email,
            manager: branch.manager,
            active: true,
            created_at: Utc::now(),
        };
        tables.branches.push(created.clone());
        Ok(created)
    }

    async fn active_branches(&self) -> Result<Vec<Branch>, StoreError> {
        let tables = self.tables.lock().await;
        let mut branches: Vec<Branch> =
            tables.branches.iter().filter(|b| b.active).cloned().collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(branches)
    }

    async fn find_branch(&self, id: i32) -> Result<Option<Branch>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.branches.iter().find(|b| b.id == id).cloned())
    }

    async fn set_branch_active(
        &self,
        id: i32,
        active: bool,
    ) -> Result<Option<Branch>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.branches.iter_mut().find(|b| b.id == id).map(|branch| {
            branch.active = active;
            branch.clone()
        }))
    }

    async fn branch_is_active(&self, id: i32) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.branches.iter().any(|b| b.id == id && b.active))
    }

    async fn create_survey(
        &self,
        req: &CreateSurveyRequest,
        created_by: i32,
    ) -> Result<i32, StoreError> {
        // A single lock spans the whole tree, so readers never see half a survey.
        let mut tables = self.tables.lock().await;
        let survey_id = tables.next_id();
        tables.surveys.push(Survey {
            id: survey_id,
            title: req.title.clone(),
            description: req.description.clone(),
            created_by,
            created_at: Utc::now(),
            deadline: req.deadline,
            active: true,
        });
        for question in &req.questions {
            let question_id = tables.next_id();
            tables.questions.push(Question {
                id: question_id,
                survey_id,
                text: question.text.clone(),
                kind: question.kind,
                required: question.required,
                position: question.position,
            });
            for option in &question.options {
                let option_id = tables.next_id();
                tables.options.push(AnswerOption {
                    id: option_id,
                    question_id,
                    text: option.text.clone(),
                    value: option.value.clone(),
                    position: option.position,
                });
            }
        }
        Ok(survey_id)
    }

    async fn survey_catalog(&self, survey_id: i32) -> Result<Option<SurveyCatalog>, StoreError> {
        let tables = self.tables.lock().await;
        let Some(survey) = tables.surveys.iter().find(|s| s.id == survey_id).cloned() else {
            return Ok(None);
        };
        let questions: Vec<Question> = tables
            .questions
            .iter()
            .filter(|q| q.survey_id == survey_id)
            .cloned()
            .collect();
        let options = tables
            .options
            .iter()
            .filter(|o| questions.iter().any(|q| q.id == o.question_id))
            .cloned()
            .collect();
        Ok(Some(SurveyCatalog::new(survey, questions, options)))
    }

    async fn max_request_sequence(&self, year: i32) -> Result<i32, StoreError> {
        if self.faults.fail_sequence_query.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected sequence query failure".to_string(),
            ));
        }
        let stale = self
            .faults
            .stale_sequence_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(0);
        }

        let prefix = format!("SOL-{year}-");
        let tables = self.tables.lock().await;
        let mut max = 0;
        for header in &tables.headers {
            let Some(suffix) = header.request_number.strip_prefix(&prefix) else {
                continue;
            };
            let chars: Vec<char> = suffix.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(6)..].iter().collect();
            // Mirrors the CAST in the SQL query: a non-numeric suffix is an error.
            let value: i32 = tail.parse().map_err(|_| {
                StoreError::Corrupt(format!(
                    "request number {} has a non-numeric suffix",
                    header.request_number
                ))
            })?;
            max = max.max(value);
        }
        Ok(max)
    }

    async fn begin_response(&self) -> Result<Box<dyn ResponseTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            faults: Arc::clone(&self.faults),
            headers: Vec::new(),
            details: Vec::new(),
            locked_pairs: Vec::new(),
        }))
    }

    async fn find_response(
        &self,
        request_number: &str,
    ) -> Result<Option<StoredResponse>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .headers
            .iter()
            .find(|h| h.request_number == request_number)
            .map(|h| tables.stored(h)))
    }

    async fn completed_responses(&self, survey_id: i32) -> Result<Vec<StoredResponse>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .headers
            .iter()
            .filter(|h| h.survey_id == survey_id && h.status == ResponseStatus::Completed)
            .map(|h| tables.stored(h))
            .collect())
    }

    async fn responses_by_respondent(
        &self,
        respondent_id: i32,
    ) -> Result<Vec<StoredResponse>, StoreError> {
        let tables = self.tables.lock().await;
        let mut responses: Vec<StoredResponse> = tables
            .headers
            .iter()
            .filter(|h| h.respondent_id == respondent_id)
            .map(|h| tables.stored(h))
            .collect();
        responses.sort_by(|a, b| {
            (b.header.started_at, b.header.id).cmp(&(a.header.started_at, a.header.id))
        });
        Ok(responses)
    }
}

/// MemoryTransaction
///
/// Staged writes of one `MemoryRepository` unit of work.
struct MemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
    headers: Vec<ResponseHeader>,
    details: Vec<ResponseDetail>,
    /// Pairs passed to `lock_respondent`; re-checked on commit.
    locked_pairs: Vec<(i32, i32)>,
}

#[async_trait]
impl ResponseTransaction for MemoryTransaction {
    async fn lock_respondent(
        &mut self,
        survey_id: i32,
        respondent_id: i32,
    ) -> Result<(), StoreError> {
        self.locked_pairs.push((survey_id, respondent_id));
        Ok(())
    }

    async fn has_completed_response(
        &mut self,
        survey_id: i32,
        respondent_id: i32,
    ) -> Result<bool, StoreError> {
        let staged = self.headers.iter().any(|h| {
            h.survey_id == survey_id
                && h.respondent_id == respondent_id
                && h.status == ResponseStatus::Completed
        });
        let tables = self.tables.lock().await;
        Ok(staged || tables.has_completed(survey_id, respondent_id))
    }

    async fn insert_header(&mut self, header: &NewResponseHeader) -> Result<i32, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(branch_id) = header.branch_id {
            if !tables.branches.iter().any(|b| b.id == branch_id) {
                return Err(StoreError::UnknownBranch(branch_id));
            }
        }
        let taken = tables
            .headers
            .iter()
            .chain(self.headers.iter())
            .any(|h| h.request_number == header.request_number);
        if taken {
            return Err(StoreError::RequestNumberTaken(
                header.request_number.clone(),
            ));
        }
        let id = tables.next_id();
        self.headers.push(ResponseHeader {
            id,
            survey_id: header.survey_id,
            respondent_id: header.respondent_id,
            branch_id: header.branch_id,
            request_number: header.request_number.clone(),
            attention_type: header.attention_type.clone(),
            client_name: header.client_name.clone(),
            client_phone: header.client_phone.clone(),
            started_at: header.started_at,
            completed_at: header.completed_at,
            status: header.status,
        });
        Ok(id)
    }

    async fn insert_detail(&mut self, detail: &NewResponseDetail) -> Result<i32, StoreError> {
        if self.faults.fail_detail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected detail insert failure".to_string(),
            ));
        }
        if !self.headers.iter().any(|h| h.id == detail.header_id) {
            return Err(StoreError::Corrupt(format!(
                "detail references unknown header {}",
                detail.header_id
            )));
        }
        let id = self.tables.lock().await.next_id();
        self.details.push(ResponseDetail {
            id,
            header_id: detail.header_id,
            question_id: detail.question_id,
            selected_option_id: detail.selected_option_id,
            free_text: detail.free_text.clone(),
            answered_at: detail.answered_at,
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let handle = Arc::clone(&self.tables);
        let mut tables = handle.lock().await;
        // Another transaction may have committed the same number since our insert.
        if let Some(clash) = self.headers.iter().find(|staged| {
            tables
                .headers
                .iter()
                .any(|h| h.request_number == staged.request_number)
        }) {
            return Err(StoreError::RequestNumberTaken(clash.request_number.clone()));
        }
        // A locked pair may have been completed by a transaction that committed
        // after our check.
        if let Some(&(survey_id, respondent_id)) = self
            .locked_pairs
            .iter()
            .find(|(survey_id, respondent_id)| tables.has_completed(*survey_id, *respondent_id))
        {
            return Err(StoreError::AlreadyResponded {
                survey_id,
                respondent_id,
            });
        }
        let MemoryTransaction {
            headers, details, ..
        } = *self;
        tables.headers.extend(headers);
        tables.details.extend(details);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
