//! GetConversation query handler.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::ConversationId;
use crate::ports::{ConversationRepository, RepositoryError};

use super::view::ConversationView;

#[derive(Debug, Clone, Error)]
pub enum GetConversationError {
    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl GetConversationError {
    pub fn code(&self) -> &'static str {
        match self {
            GetConversationError::NotFound(_) => "not_found",
            GetConversationError::Repository(_) => "internal_error",
        }
    }
}

pub struct GetConversationHandler {
    repository: Arc<dyn ConversationRepository>,
}

impl GetConversationHandler {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, id: ConversationId) -> Result<ConversationView, GetConversationError> {
        self.repository
            .find_by_id(id)
            .await?
            .map(|conversation| ConversationView::from(&conversation))
            .ok_or(GetConversationError::NotFound(id))
    }
}
