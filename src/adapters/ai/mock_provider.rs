//! Mock provider for tests.
//!
//! Replies are queued up front and consumed in order; every request is
//! recorded for later inspection.
//!
//! ```ignore
//! let provider = MockProvider::new()
//!     .with_error(TransportError::timeout("slow"))
//!     .with_response("What motivates you?");
//!
//! let reply = provider.complete(request).await?;
//! assert_eq!(provider.call_count(), 1);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    CompletionRequest, FinishReason, ProviderClient, RawCompletion, TokenUsage, TransportError,
};

/// Reply returned when the queue is empty.
pub const DEFAULT_MOCK_REPLY: &str = "Mock response";

#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(RawCompletion),
    Error(TransportError),
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Duration,
    model: String,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            model: "mock-model-1".to_string(),
        }
    }

    /// Queues a successful reply.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        let completion = RawCompletion::new(content, self.model.clone())
            .with_usage(TokenUsage::new(10, 20));
        self.with_completion(completion)
    }

    /// Queues a fully specified reply.
    pub fn with_completion(self, completion: RawCompletion) -> Self {
        lock(&self.responses).push_back(MockResponse::Success(completion));
        self
    }

    /// Queues a truncated reply.
    pub fn with_truncated_response(self, content: impl Into<String>) -> Self {
        let completion = RawCompletion::new(content, self.model.clone())
            .with_finish_reason(FinishReason::Length);
        self.with_completion(completion)
    }

    /// Queues a failure.
    pub fn with_error(self, error: TransportError) -> Self {
        lock(&self.responses).push_back(MockResponse::Error(error));
        self
    }

    /// Queues the same failure `times` times.
    pub fn with_errors(self, error: TransportError, times: usize) -> Self {
        (0..times).fold(self, |provider, _| provider.with_error(error.clone()))
    }

    /// Simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    pub fn last_call(&self) -> Option<CompletionRequest> {
        lock(&self.calls).last().cloned()
    }

    /// Replies still queued.
    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }

    fn next_response(&self) -> MockResponse {
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            MockResponse::Success(RawCompletion::new(DEFAULT_MOCK_REPLY, self.model.clone()))
        })
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, TransportError> {
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response() {
            MockResponse::Success(completion) => Ok(completion),
            MockResponse::Error(err) => Err(err),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interview::ContextMessage;
    use crate::ports::TransportErrorKind;

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![ContextMessage::user("Hello")])
    }

    #[tokio::test]
    async fn returns_responses_in_order() {
        let provider = MockProvider::new().with_response("First").with_response("Second");

        assert_eq!(provider.complete(request()).await.unwrap().content, "First");
        assert_eq!(provider.complete(request()).await.unwrap().content, "Second");
    }

    #[tokio::test]
    async fn empty_queue_returns_default() {
        let provider = MockProvider::new();
        let reply = provider.complete(request()).await.unwrap();

        assert_eq!(reply.content, DEFAULT_MOCK_REPLY);
        assert!(reply.is_complete());
    }

    #[tokio::test]
    async fn errors_are_returned_and_consumed() {
        let provider = MockProvider::new()
            .with_errors(TransportError::timeout("slow"), 2)
            .with_response("ok");

        assert_eq!(
            provider.complete(request()).await.unwrap_err().kind,
            TransportErrorKind::Timeout
        );
        assert!(provider.complete(request()).await.is_err());
        assert_eq!(provider.complete(request()).await.unwrap().content, "ok");
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn records_calls() {
        let provider = MockProvider::new();
        provider.complete(request()).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_call().unwrap().messages[0].content, "Hello");
    }

    #[tokio::test]
    async fn clones_share_state() {
        let provider = MockProvider::new().with_response("shared");
        let clone = provider.clone();

        clone.complete(request()).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn truncated_reply_reports_length() {
        let provider = MockProvider::new().with_truncated_response("cut");
        assert!(provider.complete(request()).await.unwrap().was_truncated());
    }
}
