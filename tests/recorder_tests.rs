mod common;

use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};
use common::{SeededSurvey, seed_survey, seed_user};
use survey_gate::{
    AppError, MemoryRepository, RecorderPolicy, SurveyResponseRecorder,
    models::{
        AnswerRequest, NewBranch, NewResponseHeader, ResponseStatus, Role, SubmitResponseRequest,
    },
    repository::{Repository, RepositoryState, StoreError},
    request_number::{
        MAX_SEQUENCE, RequestNumberGenerator, fallback_number, sequence_number,
    },
};

struct Fixture {
    repo: MemoryRepository,
    recorder: SurveyResponseRecorder,
    survey: SeededSurvey,
    advisor_id: i32,
}

async fn fixture_with(policy: RecorderPolicy) -> Fixture {
    let repo = MemoryRepository::new();
    let admin = seed_user(&repo, "admin@example.com", Role::Administrator).await;
    let advisor = seed_user(&repo, "advisor@example.com", Role::Advisor).await;
    let survey = seed_survey(&repo, admin.id).await;
    let recorder = SurveyResponseRecorder::new(Arc::new(repo.clone()) as RepositoryState, policy);
    Fixture {
        repo,
        recorder,
        survey,
        advisor_id: advisor.id,
    }
}

async fn fixture() -> Fixture {
    fixture_with(RecorderPolicy::default()).await
}

fn submission(answers: Vec<AnswerRequest>) -> SubmitResponseRequest {
    SubmitResponseRequest {
        client_name: Some("Luis Rojas".to_string()),
        client_phone: Some("555-0101".to_string()),
        attention_type: Some("in_person".to_string()),
        answers,
        ..Default::default()
    }
}

fn current_year() -> i32 {
    Utc::now().year()
}

fn branch(code: &str) -> NewBranch {
    NewBranch {
        code: code.to_string(),
        name: format!("Branch {code}"),
        address: None,
        city: Some("Lima".to_string()),
        phone: None,
        email: None,
        manager: None,
    }
}

fn completed_header(f: &Fixture, request_number: &str) -> NewResponseHeader {
    let now = Utc::now();
    NewResponseHeader {
        survey_id: f.survey.survey_id,
        respondent_id: f.advisor_id,
        branch_id: None,
        request_number: request_number.to_string(),
        attention_type: None,
        client_name: None,
        client_phone: None,
        started_at: now,
        completed_at: Some(now),
        status: ResponseStatus::Completed,
    }
}

// --- Atomic recording ---

#[tokio::test]
async fn test_multi_select_writes_one_header_and_a_detail_per_option() {
    let f = fixture().await;
    let payload = submission(vec![
        AnswerRequest {
            question_id: f.survey.multi_question,
            selected_options: Some(f.survey.multi_options.clone()),
            ..Default::default()
        },
        AnswerRequest {
            question_id: f.survey.single_question,
            selected_option: Some(f.survey.single_options[1]),
            ..Default::default()
        },
    ]);

    let number = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    let headers = f.repo.headers().await;
    assert_eq!(headers.len(), 1);
    let header = &headers[0];
    assert_eq!(header.request_number, number);
    assert_eq!(header.respondent_id, f.advisor_id);
    assert_eq!(header.status, ResponseStatus::Completed);
    assert!(header.completed_at.is_some());
    assert_eq!(header.client_name.as_deref(), Some("Luis Rojas"));

    let details = f.repo.details().await;
    assert_eq!(details.len(), 4);
    assert!(details.iter().all(|d| d.header_id == header.id));

    let multi: Vec<i32> = details
        .iter()
        .filter(|d| d.question_id == f.survey.multi_question)
        .filter_map(|d| d.selected_option_id)
        .collect();
    assert_eq!(multi, f.survey.multi_options);
}

#[tokio::test]
async fn test_free_text_writes_a_single_detail_without_option() {
    let f = fixture().await;
    f.recorder
        .submit(
            f.survey.survey_id,
            f.advisor_id,
            &submission(f.survey.full_answers()),
        )
        .await
        .unwrap();

    let details = f.repo.details().await;
    let text: Vec<_> = details
        .iter()
        .filter(|d| d.question_id == f.survey.text_question)
        .collect();
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].selected_option_id, None);
    assert_eq!(text[0].free_text.as_deref(), Some("Friendly staff"));
}

#[tokio::test]
async fn test_detail_failure_rolls_back_the_header() {
    let f = fixture().await;
    f.repo.fail_detail_inserts(true);

    let result = f
        .recorder
        .submit(
            f.survey.survey_id,
            f.advisor_id,
            &submission(f.survey.full_answers()),
        )
        .await;

    assert!(matches!(result, Err(AppError::Persistence(_))));
    assert!(f.repo.headers().await.is_empty());
    assert!(f.repo.details().await.is_empty());

    // The store recovers and the next submission goes through.
    f.repo.fail_detail_inserts(false);
    f.recorder
        .submit(
            f.survey.survey_id,
            f.advisor_id,
            &submission(f.survey.full_answers()),
        )
        .await
        .unwrap();
    assert_eq!(f.repo.headers().await.len(), 1);
}

#[tokio::test]
async fn test_deleting_a_header_removes_its_details() {
    let f = fixture().await;
    for _ in 0..2 {
        f.recorder
            .submit(
                f.survey.survey_id,
                f.advisor_id,
                &submission(f.survey.full_answers()),
            )
            .await
            .unwrap();
    }
    let first = f.repo.headers().await[0].id;

    assert!(f.repo.delete_response(first).await);

    let details = f.repo.details().await;
    assert_eq!(f.repo.headers().await.len(), 1);
    assert_eq!(details.len(), 5);
    assert!(details.iter().all(|d| d.header_id != first));
}

// --- Validation ---

#[tokio::test]
async fn test_question_from_another_survey_is_rejected() {
    let f = fixture().await;
    let other = seed_survey(&f.repo, 1).await;
    let mut answers = f.survey.full_answers();
    answers.push(AnswerRequest {
        question_id: other.text_question,
        free_text: Some("wrong survey".to_string()),
        ..Default::default()
    });

    let result = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &submission(answers))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(f.repo.headers().await.is_empty());
    assert!(f.repo.details().await.is_empty());
}

#[tokio::test]
async fn test_option_of_another_question_is_rejected() {
    let f = fixture().await;
    let mut answers = f.survey.full_answers();
    answers[1].selected_option = Some(f.survey.multi_options[0]);

    let result = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &submission(answers))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(f.repo.headers().await.is_empty());
}

#[tokio::test]
async fn test_malformed_answers_are_rejected() {
    let f = fixture().await;
    let s = &f.survey;

    let cases: Vec<Vec<AnswerRequest>> = vec![
        // nothing at all
        vec![],
        // two shapes at once
        vec![AnswerRequest {
            question_id: s.single_question,
            selected_option: Some(s.single_options[0]),
            free_text: Some("and text".to_string()),
            ..Default::default()
        }],
        // several options on a single choice question
        vec![AnswerRequest {
            question_id: s.single_question,
            selected_options: Some(s.single_options.clone()),
            ..Default::default()
        }],
        // free text on a choice question
        vec![AnswerRequest {
            question_id: s.multi_question,
            free_text: Some("text".to_string()),
            ..Default::default()
        }],
        // the same question twice
        vec![
            AnswerRequest {
                question_id: s.single_question,
                selected_option: Some(s.single_options[0]),
                ..Default::default()
            },
            AnswerRequest {
                question_id: s.single_question,
                selected_option: Some(s.single_options[1]),
                ..Default::default()
            },
        ],
    ];

    for answers in cases {
        let result = f
            .recorder
            .submit(s.survey_id, f.advisor_id, &submission(answers.clone()))
            .await;
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "{answers:?} should be rejected"
        );
    }
    assert!(f.repo.headers().await.is_empty());
}

#[tokio::test]
async fn test_missing_required_question_is_rejected() {
    let f = fixture().await;
    let answers = vec![AnswerRequest {
        question_id: f.survey.multi_question,
        selected_options: Some(vec![f.survey.multi_options[0]]),
        ..Default::default()
    }];

    let result = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &submission(answers))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_unknown_or_inactive_survey_is_not_found() {
    let f = fixture().await;
    let payload = submission(f.survey.full_answers());

    let unknown = f.recorder.submit(9_999, f.advisor_id, &payload).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    f.repo.set_survey_active(f.survey.survey_id, false).await;
    let inactive = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await;
    assert!(matches!(inactive, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_repeat_responses_allowed_by_default() {
    let f = fixture().await;
    let payload = submission(f.survey.full_answers());
    for _ in 0..2 {
        f.recorder
            .submit(f.survey.survey_id, f.advisor_id, &payload)
            .await
            .unwrap();
    }
    assert_eq!(f.repo.headers().await.len(), 2);
}

#[tokio::test]
async fn test_single_response_policy_rejects_second_submission() {
    let f = fixture_with(RecorderPolicy {
        single_response_per_respondent: true,
    })
    .await;
    let payload = submission(f.survey.full_answers());

    f.recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();
    let second = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await;

    assert!(matches!(second, Err(AppError::Validation(_))));
    assert_eq!(f.repo.headers().await.len(), 1);
}

#[tokio::test]
async fn test_single_response_is_rechecked_at_commit() {
    let f = fixture().await;
    let (survey_id, advisor_id) = (f.survey.survey_id, f.advisor_id);

    // Both transactions pass the check before either commits.
    let mut first = f.repo.begin_response().await.unwrap();
    let mut second = f.repo.begin_response().await.unwrap();
    for tx in [&mut first, &mut second] {
        tx.lock_respondent(survey_id, advisor_id).await.unwrap();
        assert!(!tx.has_completed_response(survey_id, advisor_id).await.unwrap());
    }
    first
        .insert_header(&completed_header(&f, "SOL-A"))
        .await
        .unwrap();
    second
        .insert_header(&completed_header(&f, "SOL-B"))
        .await
        .unwrap();

    first.commit().await.unwrap();
    let late = second.commit().await;

    assert!(matches!(late, Err(StoreError::AlreadyResponded { .. })));
    assert_eq!(f.repo.headers().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_submissions_under_single_response_policy_record_one() {
    let f = fixture_with(RecorderPolicy {
        single_response_per_respondent: true,
    })
    .await;
    let payload = submission(f.survey.full_answers());

    let results = submit_concurrently(&f, &payload).await;

    let recorded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(recorded, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::Validation(_)))
    );
    assert_eq!(f.repo.headers().await.len(), 1);
    assert_eq!(f.repo.details().await.len(), 5);
}

async fn submit_concurrently(
    f: &Fixture,
    payload: &SubmitResponseRequest,
) -> Vec<Result<String, AppError>> {
    let mut handles = Vec::new();
    for _ in 0..4 {
        let recorder = f.recorder.clone();
        let payload = payload.clone();
        let (survey_id, advisor_id) = (f.survey.survey_id, f.advisor_id);
        handles.push(tokio::spawn(async move {
            recorder.submit(survey_id, advisor_id, &payload).await
        }));
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

// --- Branches ---

#[tokio::test]
async fn test_submission_records_an_active_branch() {
    let f = fixture().await;
    let branch = f.repo.create_branch(branch("LIM01")).await.unwrap();
    let mut payload = submission(f.survey.full_answers());
    payload.branch_id = Some(branch.id);

    f.recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    assert_eq!(f.repo.headers().await[0].branch_id, Some(branch.id));
}

#[tokio::test]
async fn test_unknown_or_inactive_branch_is_rejected() {
    let f = fixture().await;
    let closed = f.repo.create_branch(branch("CUS01")).await.unwrap();
    f.repo.set_branch_active(closed.id, false).await.unwrap();

    for branch_id in [closed.id, 9999] {
        let mut payload = submission(f.survey.full_answers());
        payload.branch_id = Some(branch_id);
        let result = f
            .recorder
            .submit(f.survey.survey_id, f.advisor_id, &payload)
            .await;
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "branch {branch_id}: {result:?}"
        );
    }
    assert!(f.repo.headers().await.is_empty());
}

#[tokio::test]
async fn test_store_rejects_header_with_unknown_branch() {
    let f = fixture().await;
    let mut header = completed_header(&f, "SOL-X");
    header.branch_id = Some(4242);

    let mut tx = f.repo.begin_response().await.unwrap();
    let result = tx.insert_header(&header).await;

    assert!(matches!(result, Err(StoreError::UnknownBranch(4242))));
    assert!(matches!(
        AppError::from(StoreError::UnknownBranch(4242)),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn test_duplicate_branch_code_is_rejected() {
    let f = fixture().await;
    f.repo.create_branch(branch("ARQ01")).await.unwrap();

    let duplicate = f.repo.create_branch(branch("ARQ01")).await;

    assert!(matches!(duplicate, Err(StoreError::BranchCodeTaken(code)) if code == "ARQ01"));
}

// --- Request numbers ---

#[tokio::test]
async fn test_supplied_request_number_is_used_verbatim() {
    let f = fixture().await;
    let mut payload = submission(f.survey.full_answers());
    payload.request_number = Some("BRANCH-7-0001".to_string());

    let number = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    assert_eq!(number, "BRANCH-7-0001");
    assert_eq!(f.repo.headers().await[0].request_number, "BRANCH-7-0001");
}

#[tokio::test]
async fn test_supplied_duplicate_number_is_not_retried() {
    let f = fixture().await;
    let mut payload = submission(f.survey.full_answers());
    payload.request_number = Some("BRANCH-7-0001".to_string());

    f.recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();
    let second = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await;

    assert!(matches!(second, Err(AppError::Persistence(_))));
    assert_eq!(f.repo.headers().await.len(), 1);
}

#[tokio::test]
async fn test_generated_numbers_follow_the_yearly_sequence() {
    let f = fixture().await;
    let payload = submission(f.survey.full_answers());
    let year = current_year();

    let first = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();
    let second = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    assert_eq!(first, format!("SOL-{year}-000001"));
    assert_eq!(second, format!("SOL-{year}-000002"));
}

#[tokio::test]
async fn test_stale_sequence_read_is_retried_with_a_fresh_number() {
    let f = fixture().await;
    let payload = submission(f.survey.full_answers());
    let year = current_year();

    f.recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    // The next read misses the committed row and proposes 000001 again.
    f.repo.stale_sequence_reads(1);
    let second = f
        .recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    assert_eq!(second, format!("SOL-{year}-000002"));
    let numbers: Vec<String> = f
        .repo
        .headers()
        .await
        .into_iter()
        .map(|h| h.request_number)
        .collect();
    assert_eq!(
        numbers,
        vec![format!("SOL-{year}-000001"), format!("SOL-{year}-000002")]
    );
}

#[tokio::test]
async fn test_sequence_failure_falls_back_to_timestamp() {
    let f = fixture().await;
    f.repo.fail_sequence_query(true);

    let number = f
        .recorder
        .submit(
            f.survey.survey_id,
            f.advisor_id,
            &submission(f.survey.full_answers()),
        )
        .await
        .unwrap();

    // SOL-yyyyMMdd-HHmmss
    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "SOL");
    assert_eq!(parts[1].len(), 8);
    assert_eq!(parts[2].len(), 6);
    assert!(parts[1].chars().chain(parts[2].chars()).all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_generator_alone_can_hand_out_duplicates() {
    let repo = MemoryRepository::new();
    let generator = RequestNumberGenerator::new(Arc::new(repo.clone()) as RepositoryState);

    // Two callers read before either inserts.
    let first = generator.next(2024).await;
    let second = generator.next(2024).await;

    assert_eq!(first, "SOL-2024-000001");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_generator_falls_back_with_the_given_clock() {
    let repo = MemoryRepository::new();
    repo.fail_sequence_query(true);
    let generator = RequestNumberGenerator::new(Arc::new(repo.clone()) as RepositoryState);
    let now = Utc.with_ymd_and_hms(2024, 2, 29, 14, 5, 9).unwrap();

    assert_eq!(generator.next_at(2024, now).await, "SOL-20240229-140509");
}

#[tokio::test]
async fn test_exhausted_sequence_falls_back_to_timestamp() {
    let f = fixture().await;
    let mut payload = submission(f.survey.full_answers());
    payload.request_number = Some(sequence_number(2024, MAX_SEQUENCE));
    f.recorder
        .submit(f.survey.survey_id, f.advisor_id, &payload)
        .await
        .unwrap();

    let generator = RequestNumberGenerator::new(Arc::new(f.repo.clone()) as RepositoryState);
    let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap();

    assert_eq!(generator.next_at(2024, now).await, "SOL-20241231-235958");
    assert_eq!(generator.next(2025).await, "SOL-2025-000001");
}

#[test]
fn test_number_formats() {
    assert_eq!(sequence_number(2024, 1), "SOL-2024-000001");
    assert_eq!(sequence_number(2024, 123_456), "SOL-2024-123456");
    let now = Utc.with_ymd_and_hms(2025, 1, 3, 4, 5, 6).unwrap();
    assert_eq!(fallback_number(now), "SOL-20250103-040506");
}
