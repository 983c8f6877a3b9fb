//! Interview domain: conversations, turns, context windows, prompts and feedback.

mod conversation;
mod feedback;
mod prompts;
mod subject;
mod turn;
mod window;

pub use conversation::{
    normalize_candidate_name, CandidateMessage, Conversation, InterviewStatus,
    CANDIDATE_NAME_MAX_CHARS, MESSAGE_MAX_CHARS, MESSAGE_MIN_CHARS,
};
pub use feedback::{FeedbackParseError, FeedbackResult};
pub use prompts::{
    PromptCatalog, PromptCatalogBuilder, PromptError, PromptTemplate, PromptVersion,
    APTITUDE_GREETING, APTITUDE_SYSTEM, INTERVIEW_FEEDBACK, INTERVIEW_FEEDBACK_PROSE,
    INTERVIEW_SYSTEM,
};
pub use subject::Subject;
pub use turn::{Turn, TurnRole};
pub use window::{
    ContextMessage, ConversationWindow, WindowBudget, WindowSummary, CHARS_PER_TOKEN,
    DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS,
};
