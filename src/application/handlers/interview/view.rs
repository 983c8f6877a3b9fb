//! Read model returned to callers. System turns never leave the service.

use serde::Serialize;

use crate::domain::foundation::{ConversationId, SubjectId, Timestamp, TurnId};
use crate::domain::interview::{Conversation, Turn, TurnRole};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnView {
    pub id: TurnId,
    pub role: TurnRole,
    pub content: String,
    pub created_at: Timestamp,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            id: turn.id(),
            role: turn.role(),
            content: turn.content().to_string(),
            created_at: turn.created_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationView {
    pub id: ConversationId,
    pub title: String,
    pub subject_id: Option<SubjectId>,
    pub candidate_name: Option<String>,
    pub completed: bool,
    pub feedback: Option<String>,
    pub recommended_alternative: Option<SubjectId>,
    pub turns: Vec<TurnView>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Conversation> for ConversationView {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id(),
            title: conversation.title().to_string(),
            subject_id: conversation.subject_id().cloned(),
            candidate_name: conversation.candidate_name().map(str::to_string),
            completed: conversation.is_completed(),
            feedback: conversation.feedback().map(str::to_string),
            recommended_alternative: conversation.recommended_alternative().cloned(),
            turns: conversation.visible_turns().map(TurnView::from).collect(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
        }
    }
}
