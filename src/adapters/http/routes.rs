//! Router assembly.

use axum::{
    routing::{get, post},
    Json, Router,
};
use http::{header, HeaderValue, Method};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

use super::handlers::{create_interview, get_interview, submit_message, InterviewHandlers};

/// Interview endpoints, mounted under `/api/v1/interviews`.
pub fn interview_routes(handlers: InterviewHandlers) -> Router {
    Router::new()
        .route("/", post(create_interview))
        .route("/:id", get(get_interview))
        .route("/:id/messages", post(submit_message))
        .with_state(handlers)
}

/// Full application router.
///
/// The timeout bounds the whole request, so a submission stuck in provider
/// backoff is cancelled and its exchange rolls back.
pub fn app_router(handlers: InterviewHandlers, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/interviews", interview_routes(handlers))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Any origin when the list is empty or `*`; unparseable entries are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = if parsed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::RETRY_AFTER])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::adapters::ai::MockProvider;
    use crate::adapters::memory::{InMemoryConversationRepository, InMemorySubjectCatalog};
    use crate::adapters::rate_limiter::InMemoryRateLimiter;
    use crate::application::{
        AdmissionGuard, CreateConversationHandler, GetConversationHandler, InterviewOrchestrator,
        OrchestratorSettings, ResilientInvoker, RetryPolicy,
    };
    use crate::config::{ThrottleConfig, ThrottleRule};
    use crate::domain::interview::{PromptCatalog, PromptVersion};
    use crate::ports::RateLimitScope;

    fn router(mock: MockProvider, throttle: ThrottleConfig) -> Router {
        let repo = Arc::new(InMemoryConversationRepository::new());
        let subjects = Arc::new(InMemorySubjectCatalog::empty());
        let prompts = Arc::new(PromptCatalog::standard(PromptVersion::default()).unwrap());
        let invoker = ResilientInvoker::new(Arc::new(mock), RetryPolicy::default().with_max_attempts(1));

        let handlers = InterviewHandlers::new(
            Arc::new(CreateConversationHandler::new(
                repo.clone(),
                subjects.clone(),
                prompts.clone(),
            )),
            Arc::new(InterviewOrchestrator::new(
                repo.clone(),
                subjects,
                invoker,
                prompts,
                OrchestratorSettings::default(),
            )),
            Arc::new(GetConversationHandler::new(repo)),
            AdmissionGuard::new(Arc::new(InMemoryRateLimiter::new(throttle))),
        );
        app_router(handlers, &ServerConfig::default())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_request() -> Request<Body> {
        Request::post("/api/v1/interviews")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(r#"{"candidate_name":"Sam"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(MockProvider::new(), ThrottleConfig::default());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_returns_created_envelope() {
        // Given
        let app = router(MockProvider::new(), ThrottleConfig::default());

        // When
        let response = app.oneshot(create_request()).await.unwrap();

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["completed"], false);
        assert_eq!(body["data"]["turns"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_create_over_limit_is_throttled() {
        // Given
        let throttle =
            ThrottleConfig::default().with_rule(RateLimitScope::Create, ThrottleRule::new(1, 60));
        let app = router(MockProvider::new(), throttle);

        // When
        let first = app.clone().oneshot(create_request()).await.unwrap();
        let second = app.oneshot(create_request()).await.unwrap();

        // Then
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(header::RETRY_AFTER));
    }

    fn create_with(content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::post("/api/v1/interviews").header("x-forwarded-for", "203.0.113.9");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn empty_create_body_starts_aptitude_interview() {
        let app = router(MockProvider::new(), ThrottleConfig::default());

        let response = app.oneshot(create_with(None, "")).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["data"]["subject_id"].is_null());
    }

    #[tokio::test]
    async fn create_with_wrong_field_type_is_rejected() {
        // Given
        let app = router(MockProvider::new(), ThrottleConfig::default());

        // When
        let response = app
            .oneshot(create_with(Some("application/json"), r#"{"candidate_name":42}"#))
            .await
            .unwrap();

        // Then
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "validation_error");
    }

    #[tokio::test]
    async fn create_with_truncated_json_is_rejected() {
        let app = router(MockProvider::new(), ThrottleConfig::default());

        let response = app
            .oneshot(create_with(Some("application/json"), r#"{"candidate_name":"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "validation_error");
    }

    #[tokio::test]
    async fn create_with_non_json_content_type_is_rejected() {
        let app = router(MockProvider::new(), ThrottleConfig::default());

        let response = app
            .oneshot(create_with(Some("text/plain"), r#"{"candidate_name":"Sam"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "validation_error");
    }

    #[tokio::test]
    async fn malformed_id_is_not_found() {
        let app = router(MockProvider::new(), ThrottleConfig::default());

        let response = app
            .oneshot(Request::get("/api/v1/interviews/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "not_found");
    }

    #[tokio::test]
    async fn message_round_trip() {
        // Given
        let app = router(
            MockProvider::new().with_response("Why do you enjoy this work?"),
            ThrottleConfig::default(),
        );
        let created = body_json(app.clone().oneshot(create_request()).await.unwrap()).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        // When
        let response = app
            .oneshot(
                Request::post(format!("/api/v1/interviews/{id}/messages"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"content":"I like solving puzzles."}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let turns = body["data"]["conversation"]["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2]["content"], "Why do you enjoy this work?");
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let app = router(MockProvider::new(), ThrottleConfig::default());
        let created = body_json(app.clone().oneshot(create_request()).await.unwrap()).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::post(format!("/api/v1/interviews/{id}/messages"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"content":"   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cors_accepts_explicit_origins() {
        let _ = cors_layer(&["https://app.example.com".to_string()]);
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&[]);
    }
}
