//! HTTP handlers for interview endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{
    AdmissionGuard, CreateConversationCommand, CreateConversationHandler, GetConversationHandler,
    InterviewOrchestrator, SubmitMessageCommand,
};
use crate::domain::foundation::ConversationId;
use crate::ports::RateLimitScope;

use super::client_ip::ClientIp;
use super::dto::{ApiResponse, CreateInterviewRequest, SubmitMessageRequest, SubmitMessageResponse};
use super::error::ApiError;

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct InterviewHandlers {
    create_handler: Arc<CreateConversationHandler>,
    orchestrator: Arc<InterviewOrchestrator>,
    get_handler: Arc<GetConversationHandler>,
    admission: AdmissionGuard,
}

impl InterviewHandlers {
    pub fn new(
        create_handler: Arc<CreateConversationHandler>,
        orchestrator: Arc<InterviewOrchestrator>,
        get_handler: Arc<GetConversationHandler>,
        admission: AdmissionGuard,
    ) -> Self {
        Self {
            create_handler,
            orchestrator,
            get_handler,
            admission,
        }
    }
}

fn parse_id(raw: &str) -> Result<ConversationId, ApiError> {
    raw.parse::<ConversationId>().map_err(|_| ApiError::not_found())
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Only a body with no content at all means "use the defaults"; anything
/// else must be well-formed JSON of the expected shape.
fn parse_create_body(headers: &HeaderMap, body: &Bytes) -> Result<CreateInterviewRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateInterviewRequest::default());
    }
    if !is_json_content_type(headers) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Expected request with `Content-Type: application/json`",
        ));
    }
    Json::<CreateInterviewRequest>::from_bytes(body)
        .map(|Json(req)| req)
        .map_err(ApiError::from)
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/v1/interviews - Start an interview
///
/// An empty body starts the general aptitude interview.
pub async fn create_interview(
    State(handlers): State<InterviewHandlers>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejected) = handlers.admission.check(RateLimitScope::Create, &ip).await {
        return ApiError::from(rejected).into_response();
    }

    let req = match parse_create_body(&headers, &body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };
    let cmd = CreateConversationCommand {
        subject_id: req.subject_id,
        candidate_name: req.candidate_name,
    };

    match handlers.create_handler.handle(cmd).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok("Interview started", result.view)),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET /api/v1/interviews/:id - Conversation with its visible turns
pub async fn get_interview(
    State(handlers): State<InterviewHandlers>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejected) = handlers.admission.check(RateLimitScope::Detail, &ip).await {
        return ApiError::from(rejected).into_response();
    }

    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    match handlers.get_handler.handle(id).await {
        Ok(view) => (StatusCode::OK, Json(ApiResponse::ok("Interview retrieved", view))).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// POST /api/v1/interviews/:id/messages - Submit a candidate message
pub async fn submit_message(
    State(handlers): State<InterviewHandlers>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
    payload: Result<Json<SubmitMessageRequest>, JsonRejection>,
) -> Response {
    if let Err(rejected) = handlers.admission.check(RateLimitScope::Message, &ip).await {
        return ApiError::from(rejected).into_response();
    }

    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };

    if let Err(rejected) = handlers
        .admission
        .check(RateLimitScope::MessagePerConversation, &id.to_string())
        .await
    {
        return ApiError::from(rejected).into_response();
    }

    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };

    match handlers
        .orchestrator
        .handle(SubmitMessageCommand::new(id, req.content))
        .await
    {
        Ok(result) => {
            let message = if result.terminated {
                "Interview completed"
            } else {
                "Message sent"
            };
            let response = SubmitMessageResponse {
                conversation: result.view,
                completed: result.terminated,
                structured_feedback: result.structured_feedback,
            };
            (StatusCode::CREATED, Json(ApiResponse::ok(message, response))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
