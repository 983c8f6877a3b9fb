//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, and error types used across the interview domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ConversationId, SubjectId, TurnId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
