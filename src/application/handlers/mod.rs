//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod interview;

pub use interview::{
    ConversationView, CreateConversationCommand, CreateConversationError,
    CreateConversationHandler, CreateConversationResult, GetConversationError,
    GetConversationHandler, InterviewOrchestrator, OrchestratorSettings, SubmitMessageCommand,
    SubmitMessageError, SubmitMessageResult, TurnView,
};
