mod common;

use survey_gate::{
    AppError,
    models::{Answer, AnswerRequest, CreateBranchRequest, QuestionKind, ResponseStatus, Role},
    password::{hash_password, verify_password},
};

// --- AnswerRequest ---

#[test]
fn test_answer_shapes() {
    let multi = AnswerRequest {
        question_id: 1,
        selected_options: Some(vec![3, 4, 3, 5]),
        ..Default::default()
    };
    assert_eq!(multi.answer().unwrap(), Answer::MultiSelect(vec![3, 4, 5]));

    let single = AnswerRequest {
        question_id: 1,
        selected_option: Some(9),
        ..Default::default()
    };
    assert_eq!(single.answer().unwrap(), Answer::SingleSelect(9));

    let text = AnswerRequest {
        question_id: 1,
        free_text: Some("fine".to_string()),
        ..Default::default()
    };
    assert_eq!(text.answer().unwrap(), Answer::FreeText("fine".to_string()));
}

#[test]
fn test_empty_fields_count_as_absent() {
    let blank = AnswerRequest {
        question_id: 1,
        selected_options: Some(vec![]),
        free_text: Some("   ".to_string()),
        ..Default::default()
    };
    assert!(matches!(blank.answer(), Err(AppError::Validation(_))));

    let single_with_empty_list = AnswerRequest {
        question_id: 1,
        selected_options: Some(vec![]),
        selected_option: Some(2),
        ..Default::default()
    };
    assert_eq!(
        single_with_empty_list.answer().unwrap(),
        Answer::SingleSelect(2)
    );
}

#[test]
fn test_conflicting_shapes_are_rejected() {
    let both = AnswerRequest {
        question_id: 1,
        selected_options: Some(vec![1]),
        selected_option: Some(1),
        ..Default::default()
    };
    assert!(matches!(both.answer(), Err(AppError::Validation(_))));
}

// --- CreateSurveyRequest ---

#[test]
fn test_survey_definition_checks() {
    assert!(common::survey_request("Valid").validate().is_ok());

    let mut untitled = common::survey_request("  ");
    assert!(untitled.validate().is_err());
    untitled.title = "Titled".to_string();
    untitled.questions.clear();
    assert!(untitled.validate().is_err());

    let mut text_with_options = common::survey_request("Bad");
    text_with_options.questions[2].options = text_with_options.questions[0].options.clone();
    assert!(matches!(
        text_with_options.validate(),
        Err(AppError::Validation(_))
    ));
}

// --- CreateBranchRequest ---

#[test]
fn test_branch_request_is_normalized() {
    let request = CreateBranchRequest {
        code: "  lim01 ".to_string(),
        name: " Lima Centro ".to_string(),
        city: Some("Lima".to_string()),
        phone: Some("   ".to_string()),
        ..Default::default()
    };

    let branch = request.normalize().unwrap();
    assert_eq!(branch.code, "LIM01");
    assert_eq!(branch.name, "Lima Centro");
    assert_eq!(branch.city.as_deref(), Some("Lima"));
    assert_eq!(branch.phone, None);
    assert_eq!(branch.manager, None);
}

#[test]
fn test_branch_request_checks() {
    let valid = CreateBranchRequest {
        code: "AREQUIPA01".to_string(),
        name: "Arequipa".to_string(),
        ..Default::default()
    };
    assert!(valid.normalize().is_ok());

    for request in [
        CreateBranchRequest {
            code: " ".to_string(),
            ..valid.clone()
        },
        CreateBranchRequest {
            code: "AREQUIPA001".to_string(),
            ..valid.clone()
        },
        CreateBranchRequest {
            name: String::new(),
            ..valid.clone()
        },
    ] {
        assert!(
            matches!(request.normalize(), Err(AppError::Validation(_))),
            "{request:?} should be rejected"
        );
    }
}

// --- Enums ---

#[test]
fn test_wire_names() {
    assert_eq!(serde_json::to_string(&Role::Administrator).unwrap(), "\"administrator\"");
    assert_eq!("advisor".parse::<Role>().unwrap(), Role::Advisor);
    assert!("asesor".parse::<Role>().is_err());

    assert_eq!(
        serde_json::to_string(&QuestionKind::MultipleChoice).unwrap(),
        "\"multiple_choice\""
    );
    assert_eq!(
        "free_text".parse::<QuestionKind>().unwrap(),
        QuestionKind::FreeText
    );
    assert_eq!(
        "completed".parse::<ResponseStatus>().unwrap(),
        ResponseStatus::Completed
    );
    assert!("done".parse::<ResponseStatus>().is_err());
}

// --- Passwords ---

#[test]
fn test_password_hash_verifies() {
    let hash = hash_password("s3cret-pass").unwrap();

    assert_ne!(hash, "s3cret-pass");
    assert!(verify_password("s3cret-pass", &hash));
    assert!(!verify_password("other", &hash));
    assert!(!verify_password("s3cret-pass", "not-a-phc-string"));
}
