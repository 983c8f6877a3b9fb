//! Application layer - handlers and the services they share.
//!
//! Handlers coordinate domain objects and ports. The invoker, feedback
//! extractor and admission guard are the services the interview flow is
//! built from.

pub mod admission;
pub mod feedback_extractor;
pub mod handlers;
pub mod invoker;

pub use admission::{AdmissionGuard, AdmissionRejected};
pub use feedback_extractor::{
    ExtractedFeedback, ExtractionError, FeedbackContext, FeedbackExtractor,
};
pub use handlers::*;
pub use invoker::{
    DomainAIError, DomainAIErrorKind, GenerationSettings, ResilientInvoker, RetryPolicy,
};
