//! Ports (interfaces) the application layer depends on.
//!
//! Adapters in `crate::adapters` implement these for real infrastructure
//! (HTTP providers, PostgreSQL, Redis) and for tests (in-memory, mock).

mod conversation_repository;
mod provider_client;
mod rate_limiter;
mod subject_catalog;

pub use conversation_repository::{ConversationExchange, ConversationRepository, RepositoryError};
pub use provider_client::{
    CompletionRequest, FinishReason, ProviderClient, RawCompletion, TokenUsage, TransportError,
    TransportErrorKind, CONTEXT_LENGTH_CODE,
};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};
pub use subject_catalog::SubjectCatalog;
