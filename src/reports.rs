use std::collections::HashMap;

use crate::{
    auth::MSG_FORBIDDEN,
    error::AppError,
    models::{
        AnswerReport, Identity, OptionStatistics, QuestionKind, QuestionStatistics,
        ResponseReport, Role, StoredResponse, SurveyCatalog, SurveyStatistics,
    },
    repository::RepositoryState,
};

/// ReportService
///
/// Read side of the recorded submissions: single responses resolved against their
/// survey, a respondent's history, and per-survey tallies.
#[derive(Clone)]
pub struct ReportService {
    repo: RepositoryState,
}

impl ReportService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// by_request_number
    ///
    /// Administrators see any response; advisors only the ones they recorded.
    pub async fn by_request_number(
        &self,
        request_number: &str,
        viewer: &Identity,
    ) -> Result<ResponseReport, AppError> {
        let stored = self
            .repo
            .find_response(request_number.trim())
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("response {request_number} not found"))
            })?;

        if viewer.role != Role::Administrator && stored.header.respondent_id != viewer.subject_id {
            tracing::info!(
                subject = viewer.subject_id,
                request_number = %stored.header.request_number,
                "response read denied"
            );
            return Err(AppError::Forbidden(MSG_FORBIDDEN.to_string()));
        }

        let catalog = self.catalog_for(&stored).await?;
        self.build_report(&catalog, stored).await
    }

    /// Every response recorded by `respondent_id`, newest first.
    pub async fn respondent_history(
        &self,
        respondent_id: i32,
    ) -> Result<Vec<ResponseReport>, AppError> {
        let responses = self.repo.responses_by_respondent(respondent_id).await?;
        let mut catalogs: HashMap<i32, SurveyCatalog> = HashMap::new();
        let mut reports = Vec::with_capacity(responses.len());
        for stored in responses {
            let survey_id = stored.header.survey_id;
            if !catalogs.contains_key(&survey_id) {
                let catalog = self.catalog_for(&stored).await?;
                catalogs.insert(survey_id, catalog);
            }
            if let Some(catalog) = catalogs.get(&survey_id) {
                reports.push(self.build_report(catalog, stored).await?);
            }
        }
        Ok(reports)
    }

    /// survey_statistics
    ///
    /// Counts over completed responses only. An option's percentage is the share of
    /// those responses that picked it, rounded to two decimals; 0 when there are
    /// none.
    pub async fn survey_statistics(&self, survey_id: i32) -> Result<SurveyStatistics, AppError> {
        let catalog = self
            .repo
            .survey_catalog(survey_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("survey {survey_id} not found")))?;
        let responses = self.repo.completed_responses(survey_id).await?;
        let total_responses = responses.len();

        let mut answers_per_question: HashMap<i32, usize> = HashMap::new();
        let mut picks_per_option: HashMap<i32, usize> = HashMap::new();
        let mut texts_per_question: HashMap<i32, Vec<String>> = HashMap::new();
        for detail in responses.iter().flat_map(|r| &r.details) {
            *answers_per_question.entry(detail.question_id).or_default() += 1;
            if let Some(option_id) = detail.selected_option_id {
                *picks_per_option.entry(option_id).or_default() += 1;
            }
            if let Some(text) = &detail.free_text {
                texts_per_question
                    .entry(detail.question_id)
                    .or_default()
                    .push(text.clone());
            }
        }

        let questions = catalog
            .ordered_questions()
            .into_iter()
            .map(|question| {
                let options = match question.kind {
                    QuestionKind::FreeText => Vec::new(),
                    _ => catalog
                        .options_of(question.id)
                        .into_iter()
                        .map(|option| {
                            let count = picks_per_option.get(&option.id).copied().unwrap_or(0);
                            OptionStatistics {
                                option_id: option.id,
                                text: option.text.clone(),
                                value: option.value.clone(),
                                count,
                                percentage: percentage(count, total_responses),
                            }
                        })
                        .collect(),
                };
                QuestionStatistics {
                    question_id: question.id,
                    text: question.text.clone(),
                    kind: question.kind,
                    total_answers: answers_per_question.get(&question.id).copied().unwrap_or(0),
                    options,
                    text_answers: texts_per_question.remove(&question.id).unwrap_or_default(),
                }
            })
            .collect();

        tracing::debug!(survey_id, total_responses, "survey statistics computed");
        Ok(SurveyStatistics {
            survey_id,
            title: catalog.survey.title.clone(),
            created_at: catalog.survey.created_at,
            total_responses,
            questions,
        })
    }

    async fn catalog_for(&self, stored: &StoredResponse) -> Result<SurveyCatalog, AppError> {
        let survey_id = stored.header.survey_id;
        self.repo.survey_catalog(survey_id).await?.ok_or_else(|| {
            AppError::Persistence(format!(
                "response {} references missing survey {survey_id}",
                stored.header.request_number
            ))
        })
    }

    async fn build_report(
        &self,
        catalog: &SurveyCatalog,
        stored: StoredResponse,
    ) -> Result<ResponseReport, AppError> {
        let StoredResponse { header, details } = stored;

        let respondent_name = self
            .repo
            .find_user(header.respondent_id)
            .await?
            .map(|u| u.name);
        let branch_name = match header.branch_id {
            Some(id) => self.repo.find_branch(id).await?.map(|b| b.name),
            None => None,
        };

        let mut answers: Vec<(i32, i32, i32, AnswerReport)> = details
            .into_iter()
            .filter_map(|detail| {
                let question = catalog.question(detail.question_id)?;
                let option = detail
                    .selected_option_id
                    .and_then(|id| catalog.option(id));
                Some((
                    question.position,
                    option.map_or(0, |o| o.position),
                    detail.id,
                    AnswerReport {
                        question_id: question.id,
                        question_text: question.text.clone(),
                        kind: question.kind,
                        position: question.position,
                        option_id: detail.selected_option_id,
                        option_text: option.map(|o| o.text.clone()),
                        option_value: option.and_then(|o| o.value.clone()),
                        free_text: detail.free_text,
                        answered_at: detail.answered_at,
                    },
                ))
            })
            .collect();
        answers.sort_by_key(|(question_position, option_position, id, _)| {
            (*question_position, *option_position, *id)
        });

        Ok(ResponseReport {
            request_number: header.request_number,
            survey_id: header.survey_id,
            survey_title: catalog.survey.title.clone(),
            respondent_id: header.respondent_id,
            respondent_name,
            branch_id: header.branch_id,
            branch_name,
            attention_type: header.attention_type,
            client_name: header.client_name,
            client_phone: header.client_phone,
            started_at: header.started_at,
            completed_at: header.completed_at,
            status: header.status,
            answers: answers.into_iter().map(|(_, _, _, answer)| answer).collect(),
        })
    }
}

/// `count` as a percentage of `total`, two decimals.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 10_000.0 / total as f64).round() / 100.0
}
