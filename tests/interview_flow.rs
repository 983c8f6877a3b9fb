//! End-to-end interview flows over the public API, in-memory adapters only.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use aptitude_interview::adapters::ai::MockProvider;
use aptitude_interview::adapters::http::{app_router, InterviewHandlers};
use aptitude_interview::adapters::memory::{InMemoryConversationRepository, InMemorySubjectCatalog};
use aptitude_interview::adapters::rate_limiter::InMemoryRateLimiter;
use aptitude_interview::application::{
    AdmissionGuard, CreateConversationCommand, CreateConversationHandler, GetConversationHandler,
    InterviewOrchestrator, OrchestratorSettings, ResilientInvoker, RetryPolicy,
    SubmitMessageCommand, SubmitMessageError,
};
use aptitude_interview::config::{ServerConfig, ThrottleConfig, ThrottleRule};
use aptitude_interview::domain::foundation::SubjectId;
use aptitude_interview::domain::interview::{PromptCatalog, PromptVersion, Subject, TurnRole};
use aptitude_interview::ports::{ConversationRepository, RateLimitScope, TransportError};

const FEEDBACK: &str = r#"{
    "strengths": ["Curious"],
    "weaknesses": ["Little SQL"],
    "suggestions": ["Practice joins"],
    "adherence_percent": 62,
    "recommended_alternative": "Data Analytics",
    "summary": "Promising, with gaps in SQL.",
    "is_fit": true
}"#;

struct App {
    create: Arc<CreateConversationHandler>,
    orchestrator: Arc<InterviewOrchestrator>,
    get: Arc<GetConversationHandler>,
    repository: Arc<InMemoryConversationRepository>,
    mock: MockProvider,
}

impl App {
    fn new(mock: MockProvider, max_questions: usize) -> Self {
        let repository = Arc::new(InMemoryConversationRepository::new());
        let subjects = Arc::new(InMemorySubjectCatalog::new(vec![
            Subject::new(SubjectId::new("data-eng").unwrap(), "Data Engineering")
                .with_requirements("SQL, Python")
                .with_level("junior"),
            Subject::new(SubjectId::new("analytics").unwrap(), "Data Analytics"),
        ]));
        let prompts = Arc::new(PromptCatalog::standard(PromptVersion::V2).unwrap());
        let invoker = ResilientInvoker::new(
            Arc::new(mock.clone()),
            RetryPolicy::default().with_max_attempts(1),
        );

        Self {
            create: Arc::new(CreateConversationHandler::new(
                repository.clone(),
                subjects.clone(),
                prompts.clone(),
            )),
            orchestrator: Arc::new(InterviewOrchestrator::new(
                repository.clone(),
                subjects,
                invoker,
                prompts,
                OrchestratorSettings::default().with_max_questions(max_questions),
            )),
            get: Arc::new(GetConversationHandler::new(repository.clone())),
            repository,
            mock,
        }
    }

    fn router(&self, throttle: ThrottleConfig) -> Router {
        let handlers = InterviewHandlers::new(
            self.create.clone(),
            self.orchestrator.clone(),
            self.get.clone(),
            AdmissionGuard::new(Arc::new(InMemoryRateLimiter::new(throttle))),
        );
        app_router(handlers, &ServerConfig::default())
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "198.51.100.7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

mod completion {
    use super::*;

    #[tokio::test]
    async fn single_question_interview_completes_on_first_answer() {
        // Given: the greeting already counts as the one question
        let app = App::new(MockProvider::new().with_response(FEEDBACK), 1);
        let created = app
            .create
            .handle(CreateConversationCommand::aptitude(Some("Robin".to_string())))
            .await
            .unwrap();

        // When
        let result = app
            .orchestrator
            .handle(SubmitMessageCommand::new(created.view.id, "I enjoy puzzles."))
            .await
            .unwrap();

        // Then
        assert!(result.terminated);
        assert!(result.view.completed);
        assert!(!result.view.feedback.clone().unwrap_or_default().is_empty());
        assert_eq!(app.mock.call_count(), 1);
        let produced: Vec<_> = result
            .view
            .turns
            .iter()
            .skip(created.view.turns.len())
            .filter(|t| t.role == TurnRole::Assistant)
            .collect();
        assert_eq!(produced.len(), 1);
        assert_eq!(
            result.view.recommended_alternative,
            Some(SubjectId::new("analytics").unwrap())
        );
    }

    #[tokio::test]
    async fn subject_interview_asks_then_concludes() {
        // Given
        let mock = MockProvider::new()
            .with_response("Describe a pipeline you built.")
            .with_response(FEEDBACK);
        let app = App::new(mock, 1);
        let created = app
            .create
            .handle(CreateConversationCommand::for_subject("data-eng", None))
            .await
            .unwrap();

        // When
        let first = app
            .orchestrator
            .handle(SubmitMessageCommand::new(created.view.id, "Hello, ready."))
            .await
            .unwrap();
        let second = app
            .orchestrator
            .handle(SubmitMessageCommand::new(created.view.id, "A nightly ETL job."))
            .await
            .unwrap();

        // Then
        assert!(!first.terminated);
        assert!(second.terminated);
        assert!(second.structured_feedback);

        let stored = app.repository.find_by_id(created.view.id).await.unwrap().unwrap();
        assert!(stored.is_completed());
        assert_eq!(stored.assistant_turn_count(), 2);
    }

    #[tokio::test]
    async fn completed_interview_accepts_nothing_more() {
        // Given
        let app = App::new(MockProvider::new().with_response(FEEDBACK), 1);
        let created = app
            .create
            .handle(CreateConversationCommand::aptitude(None))
            .await
            .unwrap();
        app.orchestrator
            .handle(SubmitMessageCommand::new(created.view.id, "My answer."))
            .await
            .unwrap();
        let before = app.repository.find_by_id(created.view.id).await.unwrap().unwrap();

        // When
        let err = app
            .orchestrator
            .handle(SubmitMessageCommand::new(created.view.id, "One more thing."))
            .await
            .unwrap_err();

        // Then
        assert!(matches!(err, SubmitMessageError::AlreadyCompleted(_)));
        let after = app.repository.find_by_id(created.view.id).await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(app.mock.call_count(), 1);
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn provider_failure_leaves_no_trace() {
        // Given
        let mock = MockProvider::new().with_error(TransportError::unauthorized("bad key"));
        let app = App::new(mock, 3);
        let created = app
            .create
            .handle(CreateConversationCommand::for_subject("data-eng", None))
            .await
            .unwrap();

        // When
        let err = app
            .orchestrator
            .handle(SubmitMessageCommand::new(created.view.id, "Hello there."))
            .await
            .unwrap_err();

        // Then
        assert_eq!(err.code(), "ai_authentication_error");
        let stored = app.repository.find_by_id(created.view.id).await.unwrap().unwrap();
        assert_eq!(stored.turns().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_submissions_are_serialized() {
        // Given
        let mock = MockProvider::new()
            .with_response("First question?")
            .with_response("Second question?")
            .with_delay(Duration::from_millis(20));
        let app = App::new(mock, 5);
        let created = app
            .create
            .handle(CreateConversationCommand::for_subject("data-eng", None))
            .await
            .unwrap();
        let id = created.view.id;

        // When
        let a = {
            let orchestrator = app.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .handle(SubmitMessageCommand::new(id, "Answer one."))
                    .await
            })
        };
        let b = {
            let orchestrator = app.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .handle(SubmitMessageCommand::new(id, "Answer two."))
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Then: turns strictly alternate after the system prompt
        let stored = app.repository.find_by_id(id).await.unwrap().unwrap();
        let roles: Vec<_> = stored.turns().iter().map(|t| t.role()).collect();
        assert_eq!(
            roles,
            vec![
                TurnRole::System,
                TurnRole::User,
                TurnRole::Assistant,
                TurnRole::User,
                TurnRole::Assistant,
            ]
        );
        assert_eq!(app.mock.call_count(), 2);
    }
}

mod http {
    use super::*;

    #[tokio::test]
    async fn third_rapid_message_is_throttled_before_the_provider() {
        // Given
        let app = App::new(MockProvider::new(), 10);
        let throttle =
            ThrottleConfig::default().with_rule(RateLimitScope::Message, ThrottleRule::new(2, 60));
        let router = app.router(throttle);
        let created = body_json(
            router
                .clone()
                .oneshot(post_json("/api/v1/interviews", r#"{"subject_id":"data-eng"}"#))
                .await
                .unwrap(),
        )
        .await;
        let uri = format!("/api/v1/interviews/{}/messages", created["data"]["id"].as_str().unwrap());

        // When
        let mut statuses = Vec::new();
        for answer in ["First answer.", "Second answer.", "Third answer."] {
            let body = format!(r#"{{"content":"{answer}"}}"#);
            let response = router.clone().oneshot(post_json(&uri, &body)).await.unwrap();
            statuses.push(response.status());
        }

        // Then
        assert_eq!(
            statuses,
            vec![StatusCode::CREATED, StatusCode::CREATED, StatusCode::TOO_MANY_REQUESTS]
        );
        assert_eq!(app.mock.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let app = App::new(MockProvider::new(), 3);

        let response = app
            .router(ThrottleConfig::default())
            .oneshot(post_json("/api/v1/interviews", r#"{"subject_id":"cooking"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn detail_hides_system_turns() {
        // Given
        let app = App::new(MockProvider::new(), 3);
        let router = app.router(ThrottleConfig::default());
        let created = body_json(
            router
                .clone()
                .oneshot(post_json("/api/v1/interviews", r#"{"subject_id":"data-eng"}"#))
                .await
                .unwrap(),
        )
        .await;
        let id = created["data"]["id"].as_str().unwrap();

        // When
        let response = router
            .oneshot(
                Request::get(format!("/api/v1/interviews/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["data"]["turns"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completed_interview_answers_bad_request() {
        // Given
        let app = App::new(MockProvider::new().with_response(FEEDBACK), 1);
        let router = app.router(ThrottleConfig::default());
        let created = body_json(
            router
                .clone()
                .oneshot(post_json("/api/v1/interviews", "{}"))
                .await
                .unwrap(),
        )
        .await;
        let uri = format!("/api/v1/interviews/{}/messages", created["data"]["id"].as_str().unwrap());
        let done = router
            .clone()
            .oneshot(post_json(&uri, r#"{"content":"My only answer."}"#))
            .await
            .unwrap();
        assert_eq!(done.status(), StatusCode::CREATED);

        // When
        let response = router
            .oneshot(post_json(&uri, r#"{"content":"Anything else?"}"#))
            .await
            .unwrap();

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "chat_completed");
    }
}
