//! CreateConversation command handler.
//!
//! Starts an interview about a subject, or a general aptitude test when no
//! subject is given. The system turn is rendered from the prompt catalog;
//! the aptitude variant also opens with an assistant greeting.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::{SubjectId, ValidationError};
use crate::domain::interview::{
    normalize_candidate_name, Conversation, PromptCatalog, PromptError, Subject,
    APTITUDE_GREETING, APTITUDE_SYSTEM, INTERVIEW_SYSTEM,
};
use crate::ports::{ConversationRepository, RepositoryError, SubjectCatalog};

use super::view::ConversationView;

#[derive(Debug, Clone, Default)]
pub struct CreateConversationCommand {
    pub subject_id: Option<String>,
    pub candidate_name: Option<String>,
}

impl CreateConversationCommand {
    pub fn aptitude(candidate_name: Option<String>) -> Self {
        Self {
            subject_id: None,
            candidate_name,
        }
    }

    pub fn for_subject(subject_id: impl Into<String>, candidate_name: Option<String>) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            candidate_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateConversationResult {
    pub view: ConversationView,
}

#[derive(Debug, Clone, Error)]
pub enum CreateConversationError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Subject not found: {0}")]
    SubjectNotFound(SubjectId),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CreateConversationError {
    pub fn code(&self) -> &'static str {
        match self {
            CreateConversationError::Validation(_) => "validation_error",
            CreateConversationError::SubjectNotFound(_) => "not_found",
            CreateConversationError::Prompt(_) | CreateConversationError::Repository(_) => {
                "internal_error"
            }
        }
    }
}

pub struct CreateConversationHandler {
    repository: Arc<dyn ConversationRepository>,
    subjects: Arc<dyn SubjectCatalog>,
    prompts: Arc<PromptCatalog>,
}

impl CreateConversationHandler {
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        subjects: Arc<dyn SubjectCatalog>,
        prompts: Arc<PromptCatalog>,
    ) -> Self {
        Self {
            repository,
            subjects,
            prompts,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateConversationCommand,
    ) -> Result<CreateConversationResult, CreateConversationError> {
        let candidate_name = normalize_candidate_name(cmd.candidate_name.as_deref())?;

        let subject = match cmd.subject_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let id = SubjectId::new(raw)?;
                let subject = self
                    .subjects
                    .find(&id)
                    .await?
                    .ok_or(CreateConversationError::SubjectNotFound(id))?;
                Some(subject)
            }
            None => None,
        };

        let conversation = match &subject {
            Some(subject) => {
                let system_prompt =
                    self.prompts
                        .render(INTERVIEW_SYSTEM, None, &subject_variables(subject))?;
                Conversation::start(Some(subject), candidate_name, system_prompt, None)
            }
            None => {
                let mut variables = HashMap::new();
                variables.insert(
                    "candidate_name",
                    candidate_name.clone().unwrap_or_else(|| "candidate".to_string()),
                );
                let system_prompt = self.prompts.render(APTITUDE_SYSTEM, None, &variables)?;
                let greeting = self.prompts.render(APTITUDE_GREETING, None, &variables)?;
                Conversation::start(None, candidate_name, system_prompt, Some(greeting))
            }
        };

        self.repository.create(&conversation).await?;

        tracing::info!(
            conversation_id = %conversation.id(),
            subject_id = conversation.subject_id().map(|s| s.as_str()),
            "Interview started"
        );

        Ok(CreateConversationResult {
            view: ConversationView::from(&conversation),
        })
    }
}

fn subject_variables(subject: &Subject) -> HashMap<&'static str, String> {
    let mut variables = HashMap::new();
    variables.insert("subject_title", subject.title.clone());
    variables.insert("subject_requirements", subject.requirements.clone());
    variables.insert("subject_responsibilities", subject.responsibilities.clone());
    variables.insert(
        "subject_level",
        subject
            .level
            .clone()
            .unwrap_or_else(|| "not specified".to_string()),
    );
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryConversationRepository, InMemorySubjectCatalog};
    use crate::domain::interview::{PromptVersion, TurnRole};

    fn data_engineering() -> Subject {
        Subject::new(SubjectId::new("data-eng").unwrap(), "Data Engineering")
            .with_requirements("SQL and Python")
            .with_responsibilities("Build pipelines")
            .with_level("junior")
    }

    fn handler() -> (CreateConversationHandler, Arc<InMemoryConversationRepository>) {
        let repository = Arc::new(InMemoryConversationRepository::new());
        let subjects = Arc::new(InMemorySubjectCatalog::new(vec![data_engineering()]));
        let prompts = Arc::new(PromptCatalog::standard(PromptVersion::V2).unwrap());
        (
            CreateConversationHandler::new(repository.clone(), subjects, prompts),
            repository,
        )
    }

    mod with_subject {
        use super::*;

        #[tokio::test]
        async fn seeds_rendered_system_turn_only() {
            // Given
            let (handler, repository) = handler();

            // When
            let result = handler
                .handle(CreateConversationCommand::for_subject("data-eng", None))
                .await
                .unwrap();

            // Then
            assert!(result.view.turns.is_empty());
            assert!(result.view.title.starts_with("Interview Data Engineering - "));

            let stored = repository.find_by_id(result.view.id).await.unwrap().unwrap();
            let system = stored.system_turn().unwrap();
            assert!(system.content().contains("Data Engineering"));
            assert!(system.content().contains("SQL and Python"));
            assert!(system.content().contains("junior"));
            assert_eq!(stored.assistant_turn_count(), 0);
        }

        #[tokio::test]
        async fn unknown_subject_is_not_found() {
            // Given
            let (handler, _) = handler();

            // When
            let err = handler
                .handle(CreateConversationCommand::for_subject("nope", None))
                .await
                .unwrap_err();

            // Then
            assert!(matches!(err, CreateConversationError::SubjectNotFound(_)));
            assert_eq!(err.code(), "not_found");
        }
    }

    mod aptitude {
        use super::*;

        #[tokio::test]
        async fn greets_candidate_by_name() {
            // Given
            let (handler, _) = handler();

            // When
            let result = handler
                .handle(CreateConversationCommand::aptitude(Some("  Ana  ".to_string())))
                .await
                .unwrap();

            // Then
            assert_eq!(result.view.candidate_name.as_deref(), Some("Ana"));
            assert!(result.view.title.starts_with("Aptitude test - "));
            assert_eq!(result.view.turns.len(), 1);
            assert_eq!(result.view.turns[0].role, TurnRole::Assistant);
            assert!(result.view.turns[0].content.contains("Ana"));
        }

        #[tokio::test]
        async fn blank_subject_id_means_aptitude() {
            // Given
            let (handler, _) = handler();

            // When
            let result = handler
                .handle(CreateConversationCommand::for_subject("   ", None))
                .await
                .unwrap();

            // Then
            assert!(result.view.subject_id.is_none());
        }

        #[tokio::test]
        async fn overlong_name_is_rejected() {
            // Given
            let (handler, repository) = handler();

            // When
            let err = handler
                .handle(CreateConversationCommand::aptitude(Some("x".repeat(101))))
                .await
                .unwrap_err();

            // Then
            assert_eq!(err.code(), "validation_error");
            assert_eq!(repository.len().await, 0);
        }
    }
}
