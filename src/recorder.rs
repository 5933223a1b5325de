use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};

use crate::{
    error::AppError,
    models::{
        Answer, AnswerRequest, NewResponseDetail, NewResponseHeader, QuestionKind,
        ResponseStatus, SubmitResponseRequest, SurveyCatalog,
    },
    repository::{RepositoryState, ResponseTransaction, StoreError},
    request_number::RequestNumberGenerator,
};

/// Attempts made when a generated request number collides with a stored one.
pub const MAX_NUMBER_ATTEMPTS: usize = 3;

/// RecorderPolicy
///
/// Switches that change what the recorder accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderPolicy {
    /// Reject a second completed response for the same (survey, respondent) pair.
    pub single_response_per_respondent: bool,
}

enum WriteError {
    AlreadyResponded,
    Store(StoreError),
}

impl From<StoreError> for WriteError {
    fn from(err: StoreError) -> Self {
        WriteError::Store(err)
    }
}

/// SurveyResponseRecorder
///
/// Validates a submission against the survey catalog and writes the header plus
/// every detail row through one `ResponseTransaction`. Callers either see the whole
/// submission committed or nothing at all.
#[derive(Clone)]
pub struct SurveyResponseRecorder {
    repo: RepositoryState,
    numbers: RequestNumberGenerator,
    policy: RecorderPolicy,
}

impl SurveyResponseRecorder {
    pub fn new(repo: RepositoryState, policy: RecorderPolicy) -> Self {
        Self {
            numbers: RequestNumberGenerator::new(repo.clone()),
            repo,
            policy,
        }
    }

    /// submit
    ///
    /// Records one completed response and returns its request number.
    ///
    /// - `NotFound`: the survey does not exist or is inactive.
    /// - `Validation`: an answer is malformed or references a question or option
    ///   outside the survey, a required question is missing, the branch is unknown
    ///   or inactive, or (with `single_response_per_respondent`) the respondent
    ///   already answered.
    /// - `Persistence`: the store failed; the transaction was rolled back first.
    ///
    /// A generated request number that collides on insert or commit is regenerated
    /// in a fresh transaction, up to `MAX_NUMBER_ATTEMPTS` times. A caller-supplied
    /// number is used verbatim and never retried.
    pub async fn submit(
        &self,
        survey_id: i32,
        respondent_id: i32,
        payload: &SubmitResponseRequest,
    ) -> Result<String, AppError> {
        let catalog = self
            .repo
            .survey_catalog(survey_id)
            .await?
            .filter(|c| c.survey.active)
            .ok_or_else(|| AppError::NotFound(format!("survey {survey_id} not found")))?;

        let answers = resolve_answers(&catalog, &payload.answers)?;

        if let Some(branch_id) = payload.branch_id {
            if !self.repo.branch_is_active(branch_id).await? {
                return Err(AppError::Validation(format!(
                    "branch {branch_id} is unknown or inactive"
                )));
            }
        }

        let supplied = payload
            .request_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = Utc::now();
            let request_number = match supplied {
                Some(number) => number.to_string(),
                None => self.numbers.next_at(now.year(), now).await,
            };

            let header = NewResponseHeader {
                survey_id,
                respondent_id,
                branch_id: payload.branch_id,
                request_number: request_number.clone(),
                attention_type: payload.attention_type.clone(),
                client_name: payload.client_name.clone(),
                client_phone: payload.client_phone.clone(),
                started_at: now,
                completed_at: Some(now),
                status: ResponseStatus::Completed,
            };

            match self.write(&header, &answers, now).await {
                Ok(detail_count) => {
                    tracing::info!(
                        survey_id,
                        respondent_id,
                        request_number = %request_number,
                        detail_count,
                        "survey response recorded"
                    );
                    return Ok(request_number);
                }
                Err(WriteError::Store(StoreError::RequestNumberTaken(number)))
                    if supplied.is_none() && attempt < MAX_NUMBER_ATTEMPTS =>
                {
                    tracing::warn!(
                        request_number = %number,
                        attempt,
                        "generated request number collided, retrying"
                    );
                }
                Err(WriteError::AlreadyResponded) => {
                    return Err(AppError::Validation(format!(
                        "respondent {respondent_id} already completed survey {survey_id}"
                    )));
                }
                Err(WriteError::Store(e)) => return Err(e.into()),
            }
        }
    }

    /// Runs one transaction. Any failure rolls back before returning.
    async fn write(
        &self,
        header: &NewResponseHeader,
        answers: &[(i32, Answer)],
        now: DateTime<Utc>,
    ) -> Result<usize, WriteError> {
        let mut tx = self.repo.begin_response().await?;
        match write_rows(tx.as_mut(), header, answers, now, self.policy).await {
            Ok(count) => {
                tx.commit().await?;
                Ok(count)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("response rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

async fn write_rows(
    tx: &mut dyn ResponseTransaction,
    header: &NewResponseHeader,
    answers: &[(i32, Answer)],
    now: DateTime<Utc>,
    policy: RecorderPolicy,
) -> Result<usize, WriteError> {
    if policy.single_response_per_respondent {
        // Held until commit or rollback, so concurrent submissions for the pair queue here.
        tx.lock_respondent(header.survey_id, header.respondent_id)
            .await?;
        if tx
            .has_completed_response(header.survey_id, header.respondent_id)
            .await?
        {
            return Err(WriteError::AlreadyResponded);
        }
    }

    let header_id = tx.insert_header(header).await?;

    let mut count = 0;
    for (question_id, answer) in answers {
        for (selected_option_id, free_text) in detail_values(answer) {
            tx.insert_detail(&NewResponseDetail {
                header_id,
                question_id: *question_id,
                selected_option_id,
                free_text,
                answered_at: now,
            })
            .await?;
            count += 1;
        }
    }
    Ok(count)
}

/// One `(option, text)` pair per detail row the answer produces.
fn detail_values(answer: &Answer) -> Vec<(Option<i32>, Option<String>)> {
    match answer {
        Answer::MultiSelect(ids) => ids.iter().map(|id| (Some(*id), None)).collect(),
        Answer::SingleSelect(id) => vec![(Some(*id), None)],
        Answer::FreeText(text) => vec![(None, Some(text.clone()))],
    }
}

/// resolve_answers
///
/// Checks every answer against the catalog. The store does not enforce that a
/// detail's question belongs to the header's survey, so this is the only guard.
fn resolve_answers(
    catalog: &SurveyCatalog,
    requests: &[AnswerRequest],
) -> Result<Vec<(i32, Answer)>, AppError> {
    if requests.is_empty() {
        return Err(AppError::Validation("submission has no answers".to_string()));
    }

    let survey_id = catalog.survey.id;
    let mut answered = HashSet::new();
    let mut resolved = Vec::with_capacity(requests.len());

    for request in requests {
        let question = catalog.question(request.question_id).ok_or_else(|| {
            AppError::Validation(format!(
                "question {} does not belong to survey {survey_id}",
                request.question_id
            ))
        })?;
        if !answered.insert(question.id) {
            return Err(AppError::Validation(format!(
                "question {} is answered more than once",
                question.id
            )));
        }

        let answer = request.answer()?;
        let option_ids: &[i32] = match (&answer, question.kind) {
            (Answer::FreeText(_), QuestionKind::FreeText) => &[],
            (Answer::FreeText(_), _) => {
                return Err(AppError::Validation(format!(
                    "question {} expects selected options, not free text",
                    question.id
                )));
            }
            (_, QuestionKind::FreeText) => {
                return Err(AppError::Validation(format!(
                    "question {} expects free text",
                    question.id
                )));
            }
            (Answer::MultiSelect(ids), QuestionKind::SingleChoice) if ids.len() > 1 => {
                return Err(AppError::Validation(format!(
                    "question {} accepts a single option",
                    question.id
                )));
            }
            (Answer::MultiSelect(ids), _) => ids,
            (Answer::SingleSelect(id), _) => std::slice::from_ref(id),
        };

        for option_id in option_ids {
            let belongs = catalog
                .option(*option_id)
                .is_some_and(|o| o.question_id == question.id);
            if !belongs {
                return Err(AppError::Validation(format!(
                    "option {option_id} does not belong to question {}",
                    question.id
                )));
            }
        }

        resolved.push((question.id, answer));
    }

    if let Some(missing) = catalog
        .ordered_questions()
        .into_iter()
        .find(|q| q.required && !answered.contains(&q.id))
    {
        return Err(AppError::Validation(format!(
            "required question {} is not answered",
            missing.id
        )));
    }

    Ok(resolved)
}
