#![allow(dead_code)]

use std::sync::Arc;

use survey_gate::{
    AppConfig, AppState, MemoryRepository,
    models::{
        AnswerRequest, CreateOptionRequest, CreateQuestionRequest, CreateSurveyRequest, NewUser,
        QuestionKind, Role, User,
    },
    password,
    repository::{Repository, RepositoryState},
};

pub const PASSWORD: &str = "correct horse battery staple";

/// Ids of a seeded three-question survey.
pub struct SeededSurvey {
    pub survey_id: i32,
    /// Required multiple choice, three options.
    pub multi_question: i32,
    pub multi_options: Vec<i32>,
    /// Required single choice, two options.
    pub single_question: i32,
    pub single_options: Vec<i32>,
    /// Optional free text.
    pub text_question: i32,
}

impl SeededSurvey {
    /// A complete, valid answer set.
    pub fn full_answers(&self) -> Vec<AnswerRequest> {
        vec![
            AnswerRequest {
                question_id: self.multi_question,
                selected_options: Some(self.multi_options.clone()),
                ..Default::default()
            },
            AnswerRequest {
                question_id: self.single_question,
                selected_option: Some(self.single_options[0]),
                ..Default::default()
            },
            AnswerRequest {
                question_id: self.text_question,
                free_text: Some("Friendly staff".to_string()),
                ..Default::default()
            },
        ]
    }
}

pub async fn seed_user(repo: &MemoryRepository, email: &str, role: Role) -> User {
    repo.create_user(NewUser {
        name: format!("{role} user"),
        email: email.to_string(),
        password_hash: password::hash_password(PASSWORD).unwrap(),
        role,
    })
    .await
    .unwrap()
}

pub fn survey_request(title: &str) -> CreateSurveyRequest {
    let option = |text: &str, position: i32| CreateOptionRequest {
        text: text.to_string(),
        value: Some(text.to_lowercase()),
        position,
    };
    CreateSurveyRequest {
        title: title.to_string(),
        description: Some("Branch service quality".to_string()),
        deadline: None,
        questions: vec![
            CreateQuestionRequest {
                text: "Which services did you use?".to_string(),
                kind: QuestionKind::MultipleChoice,
                required: true,
                position: 1,
                options: vec![option("Loans", 1), option("Savings", 2), option("Cards", 3)],
            },
            CreateQuestionRequest {
                text: "Were you satisfied?".to_string(),
                kind: QuestionKind::SingleChoice,
                required: true,
                position: 2,
                options: vec![option("Yes", 1), option("No", 2)],
            },
            CreateQuestionRequest {
                text: "Anything else?".to_string(),
                kind: QuestionKind::FreeText,
                required: false,
                position: 3,
                options: vec![],
            },
        ],
    }
}

pub async fn seed_survey(repo: &MemoryRepository, created_by: i32) -> SeededSurvey {
    let survey_id = repo
        .create_survey(&survey_request("Customer satisfaction"), created_by)
        .await
        .unwrap();
    let catalog = repo.survey_catalog(survey_id).await.unwrap().unwrap();
    let questions = catalog.ordered_questions();
    let option_ids = |question_id: i32| -> Vec<i32> {
        catalog.options_of(question_id).iter().map(|o| o.id).collect()
    };

    SeededSurvey {
        survey_id,
        multi_question: questions[0].id,
        multi_options: option_ids(questions[0].id),
        single_question: questions[1].id,
        single_options: option_ids(questions[1].id),
        text_question: questions[2].id,
    }
}

pub fn app_state(repo: &MemoryRepository, config: AppConfig) -> AppState {
    AppState::new(config, Arc::new(repo.clone()) as RepositoryState).unwrap()
}
