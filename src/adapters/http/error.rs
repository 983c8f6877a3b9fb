//! Mapping of application errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::{
    AdmissionRejected, CreateConversationError, DomainAIErrorKind, GetConversationError,
    SubmitMessageError,
};

use super::dto::ApiResponse;

const INTERNAL_MESSAGE: &str = "Internal server error.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retry_after_secs: Option<u32>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn with_retry_after(mut self, secs: Option<u32>) -> Self {
        self.retry_after_secs = secs;
        self
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "Interview not found.")
    }

    fn internal(detail: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", INTERNAL_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::failure(self.message.clone(), self.code, self.message);
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<AdmissionRejected> for ApiError {
    fn from(err: AdmissionRejected) -> Self {
        ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            err.code(),
            format!(
                "Too many requests. Try again in {} seconds.",
                err.retry_after_secs
            ),
        )
        .with_retry_after(Some(err.retry_after_secs))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "validation_error", err.body_text())
    }
}

impl From<CreateConversationError> for ApiError {
    fn from(err: CreateConversationError) -> Self {
        match &err {
            CreateConversationError::Validation(e) => {
                ApiError::new(StatusCode::BAD_REQUEST, err.code(), e.to_string())
            }
            CreateConversationError::SubjectNotFound(id) => ApiError::new(
                StatusCode::NOT_FOUND,
                err.code(),
                format!("Subject {} not found.", id),
            ),
            CreateConversationError::Prompt(_) | CreateConversationError::Repository(_) => {
                ApiError::internal(&err)
            }
        }
    }
}

impl From<GetConversationError> for ApiError {
    fn from(err: GetConversationError) -> Self {
        match &err {
            GetConversationError::NotFound(_) => ApiError::not_found(),
            GetConversationError::Repository(_) => ApiError::internal(&err),
        }
    }
}

impl From<SubmitMessageError> for ApiError {
    fn from(err: SubmitMessageError) -> Self {
        match &err {
            SubmitMessageError::Validation(e) => {
                ApiError::new(StatusCode::BAD_REQUEST, err.code(), e.to_string())
            }
            SubmitMessageError::NotFound(_) => ApiError::not_found(),
            SubmitMessageError::AlreadyCompleted(_) => ApiError::new(
                StatusCode::BAD_REQUEST,
                err.code(),
                "This interview has already been completed.",
            ),
            SubmitMessageError::AI(ai) => {
                let status = match ai.kind {
                    DomainAIErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    DomainAIErrorKind::Connection => StatusCode::SERVICE_UNAVAILABLE,
                    DomainAIErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
                    DomainAIErrorKind::Authentication => StatusCode::INTERNAL_SERVER_ERROR,
                    DomainAIErrorKind::InvalidResponse | DomainAIErrorKind::ContextTooLong => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                if ai.kind == DomainAIErrorKind::Authentication {
                    tracing::error!(error = %ai.message, "LLM provider rejected the configured credentials");
                } else {
                    tracing::warn!(code = ai.code(), error = %ai.message, "LLM provider failure");
                }
                ApiError::new(status, ai.code(), ai.user_message())
                    .with_retry_after(ai.retry_after_secs)
            }
            SubmitMessageError::Prompt(_) | SubmitMessageError::Repository(_) => {
                ApiError::internal(&err)
            }
        }
    }
}
