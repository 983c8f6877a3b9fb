//! Resilient invocation of the LLM provider.
//!
//! Wraps a [`ProviderClient`] with bounded retries and exponential backoff,
//! and translates transport failures into the [`DomainAIError`] taxonomy the
//! rest of the application reasons about.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::AiConfig;
use crate::domain::interview::ContextMessage;
use crate::ports::{CompletionRequest, ProviderClient, RawCompletion, TransportError, TransportErrorKind};

/// Unit of the exponential backoff schedule.
pub const BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Upper bound on any single sleep between attempts.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Categories of provider failure visible to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainAIErrorKind {
    Timeout,
    RateLimit,
    Connection,
    Authentication,
    InvalidResponse,
    ContextTooLong,
}

/// A provider failure after the retry policy has run its course.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct DomainAIError {
    pub kind: DomainAIErrorKind,
    pub message: String,
    /// Only set for rate limits that carried a hint.
    pub retry_after_secs: Option<u32>,
}

impl DomainAIError {
    pub fn new(kind: DomainAIErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn with_retry_after(mut self, secs: Option<u32>) -> Self {
        self.retry_after_secs = secs;
        self
    }

    /// Stable error code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self.kind {
            DomainAIErrorKind::Timeout => "ai_timeout",
            DomainAIErrorKind::RateLimit => "ai_rate_limit",
            DomainAIErrorKind::Connection => "ai_connection_error",
            DomainAIErrorKind::Authentication => "ai_authentication_error",
            DomainAIErrorKind::InvalidResponse => "ai_invalid_response",
            DomainAIErrorKind::ContextTooLong => "ai_context_too_long",
        }
    }

    /// Message safe to show to a candidate. Never echoes provider output.
    pub fn user_message(&self) -> String {
        match self.kind {
            DomainAIErrorKind::Timeout => "The interviewer took too long to respond.".to_string(),
            DomainAIErrorKind::RateLimit => match self.retry_after_secs {
                Some(secs) => format!("Too many requests. Try again in {secs} seconds."),
                None => "Too many requests. Try again shortly.".to_string(),
            },
            DomainAIErrorKind::Connection => {
                "Could not reach the interviewer service.".to_string()
            }
            DomainAIErrorKind::Authentication => {
                "The interview service is misconfigured. Please contact the administrator.".to_string()
            }
            DomainAIErrorKind::InvalidResponse => {
                "The interviewer returned an invalid response.".to_string()
            }
            DomainAIErrorKind::ContextTooLong => {
                "This conversation is too long to continue.".to_string()
            }
        }
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: BACKOFF_UNIT,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff_unit: BACKOFF_UNIT,
            backoff_cap: config.backoff_cap(),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sleep before the attempt following `attempt` (zero-based).
    pub fn delay_after(&self, attempt: u32, error: &TransportError) -> Duration {
        if let TransportErrorKind::RateLimited {
            retry_after_secs: Some(hint),
        } = error.kind
        {
            return Duration::from_secs(u64::from(hint)).min(self.backoff_cap);
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_unit.saturating_mul(factor).min(self.backoff_cap)
    }
}

/// Sampling parameters applied to every request the application builds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        }
    }

    pub fn request(&self, messages: Vec<ContextMessage>) -> CompletionRequest {
        CompletionRequest::new(messages)
            .with_max_output_tokens(self.max_output_tokens)
            .with_temperature(self.temperature)
    }
}

enum Disposition {
    Retry,
    Fail(DomainAIError),
}

fn classify(error: &TransportError) -> Disposition {
    match &error.kind {
        TransportErrorKind::Unauthorized => Disposition::Fail(DomainAIError::new(
            DomainAIErrorKind::Authentication,
            error.message.clone(),
        )),
        TransportErrorKind::BadRequest { .. } if error.indicates_context_overflow() => {
            Disposition::Fail(DomainAIError::new(
                DomainAIErrorKind::ContextTooLong,
                error.message.clone(),
            ))
        }
        TransportErrorKind::BadRequest { .. } => Disposition::Fail(DomainAIError::new(
            DomainAIErrorKind::InvalidResponse,
            error.message.clone(),
        )),
        TransportErrorKind::Timeout
        | TransportErrorKind::Connection
        | TransportErrorKind::RateLimited { .. }
        | TransportErrorKind::ServerError { .. }
        | TransportErrorKind::MalformedResponse => Disposition::Retry,
    }
}

fn exhausted(error: TransportError) -> DomainAIError {
    match error.kind {
        TransportErrorKind::Timeout => DomainAIError::new(DomainAIErrorKind::Timeout, error.message),
        TransportErrorKind::RateLimited { retry_after_secs } => {
            DomainAIError::new(DomainAIErrorKind::RateLimit, error.message)
                .with_retry_after(retry_after_secs)
        }
        TransportErrorKind::MalformedResponse => {
            DomainAIError::new(DomainAIErrorKind::InvalidResponse, error.message)
        }
        TransportErrorKind::Unauthorized => {
            DomainAIError::new(DomainAIErrorKind::Authentication, error.message)
        }
        TransportErrorKind::BadRequest { .. } => {
            DomainAIError::new(DomainAIErrorKind::InvalidResponse, error.message)
        }
        TransportErrorKind::Connection | TransportErrorKind::ServerError { .. } => {
            DomainAIError::new(DomainAIErrorKind::Connection, error.message)
        }
    }
}

/// Calls the provider under a [`RetryPolicy`].
#[derive(Clone)]
pub struct ResilientInvoker {
    client: Arc<dyn ProviderClient>,
    policy: RetryPolicy,
}

impl ResilientInvoker {
    pub fn new(client: Arc<dyn ProviderClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.client.name()
    }

    /// Runs the request, retrying transient failures.
    ///
    /// Authentication failures and rejected requests surface on the first
    /// attempt. No sleep follows the final attempt.
    pub async fn invoke(&self, request: CompletionRequest) -> Result<RawCompletion, DomainAIError> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match self.client.complete(request.clone()).await {
                Ok(completion) => {
                    if completion.was_truncated() {
                        tracing::warn!(
                            provider = self.client.name(),
                            model = %completion.model,
                            "Provider reply was truncated at the output limit"
                        );
                    }
                    if completion.was_filtered() {
                        tracing::warn!(
                            provider = self.client.name(),
                            model = %completion.model,
                            "Provider reply was cut by a content filter"
                        );
                    }
                    tracing::info!(
                        provider = self.client.name(),
                        model = %completion.model,
                        attempt = attempt + 1,
                        prompt_tokens = completion.usage.prompt_tokens,
                        completion_tokens = completion.usage.completion_tokens,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Provider call succeeded"
                    );
                    return Ok(completion);
                }
                Err(error) => match classify(&error) {
                    Disposition::Fail(domain) => {
                        tracing::error!(
                            provider = self.client.name(),
                            kind = error.kind.as_str(),
                            code = domain.code(),
                            "Provider call failed without retry"
                        );
                        return Err(domain);
                    }
                    Disposition::Retry => {
                        tracing::warn!(
                            provider = self.client.name(),
                            attempt = attempt + 1,
                            max_attempts,
                            kind = error.kind.as_str(),
                            error = %error.message,
                            "Provider attempt failed"
                        );
                        if attempt + 1 < max_attempts {
                            tokio::time::sleep(self.policy.delay_after(attempt, &error)).await;
                        }
                        last_error = Some(error);
                    }
                },
            }
        }

        let domain = match last_error {
            Some(error) => exhausted(error),
            None => DomainAIError::new(DomainAIErrorKind::Connection, "no attempt was made"),
        };
        tracing::error!(
            provider = self.client.name(),
            max_attempts,
            code = domain.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider retries exhausted"
        );
        Err(domain)
    }
}
