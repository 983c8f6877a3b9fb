//! Request bodies and the response envelope.

use serde::{Deserialize, Serialize};

use crate::application::ConversationView;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateInterviewRequest {
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub candidate_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitMessageResponse {
    pub conversation: ConversationView,
    /// This message ended the interview.
    pub completed: bool,
    pub structured_feedback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub detail: String,
}

/// Every response body has this shape.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub errors: Vec<ErrorDetail>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: vec![ErrorDetail {
                code: code.into(),
                detail: detail.into(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::<()>::failure(
            "Interview already completed",
            "chat_completed",
            "No further messages are accepted.",
        ))
        .unwrap();

        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert_eq!(body["errors"][0]["code"], "chat_completed");
    }

    #[test]
    fn create_request_fields_are_optional() {
        let req: CreateInterviewRequest = serde_json::from_str("{}").unwrap();
        assert!(req.subject_id.is_none() && req.candidate_name.is_none());
    }
}
