//! Interview command and query handlers.

mod create_conversation;
mod get_conversation;
mod submit_message;
mod view;

pub use create_conversation::{
    CreateConversationCommand, CreateConversationError, CreateConversationHandler,
    CreateConversationResult,
};
pub use get_conversation::{GetConversationError, GetConversationHandler};
pub use submit_message::{
    InterviewOrchestrator, OrchestratorSettings, SubmitMessageCommand, SubmitMessageError,
    SubmitMessageResult,
};
pub use view::{ConversationView, TurnView};
