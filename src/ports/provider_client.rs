//! Provider Client Port - single request/response exchange with an LLM backend.
//!
//! An implementation performs exactly one network call per `complete` and
//! never retries. It classifies failures into [`TransportErrorKind`]; what to
//! do about them is decided by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::interview::ContextMessage;

/// Port for LLM provider transports.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Sends the rendered messages and returns the provider's reply.
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, TransportError>;

    /// Provider name for logs (e.g. "openai").
    fn name(&self) -> &str;
}

/// A provider-agnostic completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Messages in wire order, leading system turn included.
    pub messages: Vec<ContextMessage>,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// JSON schema the reply must follow, when structured output is wanted.
    pub structured_schema: Option<serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ContextMessage>) -> Self {
        Self {
            messages,
            max_output_tokens: 1000,
            temperature: 0.7,
            structured_schema: None,
        }
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_structured_schema(mut self, schema: serde_json::Value) -> Self {
        self.structured_schema = Some(schema);
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    /// Hit the output token limit; the reply is truncated.
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Other => "other",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider reply, before any domain interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
    pub request_id: Option<String>,
}

impl RawCompletion {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: TokenUsage::default(),
            finish_reason: FinishReason::Stop,
            request_id: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Only `stop` counts as a fully formed answer.
    pub fn is_complete(&self) -> bool {
        self.finish_reason == FinishReason::Stop
    }

    pub fn was_truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }

    pub fn was_filtered(&self) -> bool {
        self.finish_reason == FinishReason::ContentFilter
    }
}

/// Provider error code meaning the input exceeded the model's context.
pub const CONTEXT_LENGTH_CODE: &str = "context_length_exceeded";

/// Raw classification of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    RateLimited { retry_after_secs: Option<u32> },
    Unauthorized,
    /// Request rejected; `code` is the provider's structured error code, if any.
    BadRequest { code: Option<String> },
    ServerError { status: u16 },
    MalformedResponse,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connection => "connection",
            TransportErrorKind::RateLimited { .. } => "rate_limited",
            TransportErrorKind::Unauthorized => "unauthorized",
            TransportErrorKind::BadRequest { .. } => "bad_request",
            TransportErrorKind::ServerError { .. } => "server_error",
            TransportErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

/// A failed provider exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} error: {message}", kind.as_str())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }

    pub fn rate_limited(retry_after_secs: Option<u32>, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimited { retry_after_secs }, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unauthorized, message)
    }

    pub fn bad_request(code: Option<String>, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::BadRequest { code }, message)
    }

    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ServerError { status }, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MalformedResponse, message)
    }

    /// True for a bad request caused by an over-long input.
    ///
    /// Prefers the structured code; the message match is a heuristic for
    /// providers that don't send one.
    pub fn indicates_context_overflow(&self) -> bool {
        let TransportErrorKind::BadRequest { code } = &self.kind else {
            return false;
        };
        if code.as_deref() == Some(CONTEXT_LENGTH_CODE) {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("context_length") || message.contains("maximum context length")
    }
}
