//! Conversation repository port.
//!
//! Reads are plain lookups. Writes to an existing conversation go through a
//! [`ConversationExchange`]: a unit of work that holds the conversation
//! exclusively until it is committed or dropped.

use async_trait::async_trait;

use crate::domain::foundation::{ConversationId, SubjectId};
use crate::domain::interview::{Conversation, Turn};

/// Repository port for interview conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Persist a new conversation with its seeded turns.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a conversation with the same id exists
    /// - `Database` on persistence failure
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError>;

    /// Committed state of a conversation, if it exists.
    async fn find_by_id(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError>;

    /// Lock a conversation for an all-or-nothing exchange.
    ///
    /// Waits while another exchange on the same conversation is open.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the conversation doesn't exist
    /// - `Database` on persistence failure
    async fn begin_exchange(
        &self,
        id: ConversationId,
    ) -> Result<Box<dyn ConversationExchange>, RepositoryError>;
}

/// Exclusive unit of work over one conversation.
///
/// Staged writes become visible only on [`commit`](Self::commit). Dropping
/// the exchange discards them.
#[async_trait]
pub trait ConversationExchange: Send {
    /// Snapshot taken when the exchange began, plus staged changes.
    fn conversation(&self) -> &Conversation;

    /// Stage a new turn.
    async fn append_turn(&mut self, turn: &Turn) -> Result<(), RepositoryError>;

    /// Stage completion with its feedback.
    async fn mark_completed(
        &mut self,
        feedback: &str,
        recommended_alternative: Option<&SubjectId>,
    ) -> Result<(), RepositoryError>;

    /// Make every staged change visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Errors from conversation persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}
