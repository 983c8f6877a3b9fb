//! SubmitMessage command handler: the interview state machine.
//!
//! One submission runs inside a single [`ConversationExchange`]: the
//! candidate turn, the model's reply and the completion flag are committed
//! together or not at all. Once the interviewer has asked `max_questions`
//! questions, the next submission is the terminating turn and produces the
//! final feedback instead of another question.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{AiConfig, InterviewConfig};
use crate::domain::foundation::{ConversationId, SubjectId, ValidationError};
use crate::domain::interview::{
    CandidateMessage, ContextMessage, Conversation, ConversationWindow, PromptCatalog, PromptError,
    WindowBudget,
};
use crate::ports::{ConversationExchange, ConversationRepository, RepositoryError, SubjectCatalog};

use super::view::ConversationView;
use crate::application::feedback_extractor::{
    ExtractedFeedback, ExtractionError, FeedbackContext, FeedbackExtractor,
};
use crate::application::invoker::{
    DomainAIError, DomainAIErrorKind, GenerationSettings, ResilientInvoker,
};

#[derive(Debug, Clone)]
pub struct SubmitMessageCommand {
    pub conversation_id: ConversationId,
    pub content: String,
}

impl SubmitMessageCommand {
    pub fn new(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitMessageResult {
    pub view: ConversationView,
    /// This submission closed the interview.
    pub terminated: bool,
    /// Final feedback came from the structured path rather than prose.
    pub structured_feedback: bool,
}

#[derive(Debug, Clone, Error)]
pub enum SubmitMessageError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("Conversation {0} is already completed")]
    AlreadyCompleted(ConversationId),

    #[error("AI provider error: {0}")]
    AI(#[from] DomainAIError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for SubmitMessageError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => SubmitMessageError::NotFound(id),
            other => SubmitMessageError::Repository(other),
        }
    }
}

impl From<ExtractionError> for SubmitMessageError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::AI(err) => SubmitMessageError::AI(err),
            ExtractionError::Prompt(err) => SubmitMessageError::Prompt(err),
        }
    }
}

impl SubmitMessageError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmitMessageError::Validation(_) => "validation_error",
            SubmitMessageError::NotFound(_) => "not_found",
            SubmitMessageError::AlreadyCompleted(_) => "chat_completed",
            SubmitMessageError::AI(err) => err.code(),
            SubmitMessageError::Prompt(_) | SubmitMessageError::Repository(_) => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    /// Assistant turns after which the next submission terminates.
    pub max_questions: usize,
    pub budget: WindowBudget,
    pub generation: GenerationSettings,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_questions: 5,
            budget: WindowBudget::default(),
            generation: GenerationSettings::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(interview: &InterviewConfig, ai: &AiConfig) -> Self {
        Self {
            max_questions: interview.max_questions,
            budget: interview.window_budget(),
            generation: GenerationSettings::from_config(ai),
        }
    }

    pub fn with_max_questions(mut self, max_questions: usize) -> Self {
        self.max_questions = max_questions;
        self
    }

    pub fn with_budget(mut self, budget: WindowBudget) -> Self {
        self.budget = budget;
        self
    }
}

pub struct InterviewOrchestrator {
    repository: Arc<dyn ConversationRepository>,
    subjects: Arc<dyn SubjectCatalog>,
    invoker: ResilientInvoker,
    extractor: FeedbackExtractor,
    settings: OrchestratorSettings,
}

impl InterviewOrchestrator {
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        subjects: Arc<dyn SubjectCatalog>,
        invoker: ResilientInvoker,
        prompts: Arc<PromptCatalog>,
        settings: OrchestratorSettings,
    ) -> Self {
        let extractor = FeedbackExtractor::new(invoker.clone(), prompts, settings.generation);
        Self {
            repository,
            subjects,
            invoker,
            extractor,
            settings,
        }
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.settings
    }

    pub async fn handle(
        &self,
        cmd: SubmitMessageCommand,
    ) -> Result<SubmitMessageResult, SubmitMessageError> {
        let message = CandidateMessage::parse(&cmd.content)?;
        let mut exchange = self.repository.begin_exchange(cmd.conversation_id).await?;
        let mut conversation = exchange.conversation().clone();

        if conversation.is_completed() {
            tracing::info!(
                conversation_id = %cmd.conversation_id,
                "Rejected message for completed interview"
            );
            return Err(SubmitMessageError::AlreadyCompleted(cmd.conversation_id));
        }

        let history: Vec<ContextMessage> =
            conversation.turns().iter().map(ContextMessage::from).collect();
        let asked = conversation.assistant_turn_count();
        let terminating = asked >= self.settings.max_questions;

        let candidate_turn = conversation.append_candidate_turn(message)?.clone();
        exchange.append_turn(&candidate_turn).await?;

        tracing::debug!(
            conversation_id = %cmd.conversation_id,
            assistant_turns = asked,
            max_questions = self.settings.max_questions,
            terminating,
            "Processing candidate message"
        );

        let structured_feedback = if terminating {
            let structured = self.finish(&mut conversation, exchange.as_mut()).await?;
            tracing::info!(
                conversation_id = %cmd.conversation_id,
                structured,
                recommended = conversation.recommended_alternative().map(|s| s.as_str()),
                "Interview completed"
            );
            structured
        } else {
            let reply = self.next_question(&history, candidate_turn.content()).await?;
            let reply_turn = conversation.append_assistant_turn(reply)?.clone();
            exchange.append_turn(&reply_turn).await?;
            false
        };

        exchange.commit().await?;

        Ok(SubmitMessageResult {
            view: ConversationView::from(&conversation),
            terminated: terminating,
            structured_feedback,
        })
    }

    /// Next interviewer question. The window excludes the candidate turn
    /// just appended; its content is pushed last.
    async fn next_question(
        &self,
        history: &[ContextMessage],
        content: &str,
    ) -> Result<String, SubmitMessageError> {
        let budget = self.settings.budget;
        match self.ask(history, content, budget).await {
            Err(err) if err.kind == DomainAIErrorKind::ContextTooLong => {
                tracing::warn!(
                    max_tokens = budget.max_tokens,
                    max_messages = budget.max_messages,
                    "Context too long, retrying with a halved window"
                );
                Ok(self.ask(history, content, budget.halved()).await?)
            }
            other => Ok(other?),
        }
    }

    async fn ask(
        &self,
        history: &[ContextMessage],
        content: &str,
        budget: WindowBudget,
    ) -> Result<String, DomainAIError> {
        let mut window = ConversationWindow::build(None, history.iter().cloned(), budget);
        window.push(ContextMessage::user(content));
        tracing::debug!(window = ?window.summary(), "Requesting next question");

        let request = self.settings.generation.request(window.render());
        Ok(self.invoker.invoke(request).await?.content)
    }

    /// Produces the final feedback and stages completion. Returns whether
    /// the feedback was structured.
    async fn finish(
        &self,
        conversation: &mut Conversation,
        exchange: &mut dyn ConversationExchange,
    ) -> Result<bool, SubmitMessageError> {
        let context = FeedbackContext::new(self.subject_title(conversation).await);
        let budget = self.settings.budget;

        let window = ConversationWindow::from_turns(conversation.turns(), budget);
        let feedback = match self.extractor.extract(&window, &context).await {
            Err(ExtractionError::AI(err)) if err.kind == DomainAIErrorKind::ContextTooLong => {
                tracing::warn!(
                    max_tokens = budget.max_tokens,
                    max_messages = budget.max_messages,
                    "Context too long for feedback, retrying with a halved window"
                );
                let window = ConversationWindow::from_turns(conversation.turns(), budget.halved());
                self.extractor.extract(&window, &context).await?
            }
            other => other?,
        };

        let text = feedback.feedback_text();
        let alternative = self.resolve_alternative(&feedback).await;

        let final_turn = conversation.append_assistant_turn(text.clone())?.clone();
        exchange.append_turn(&final_turn).await?;
        conversation.complete(text.clone(), alternative.clone())?;
        exchange.mark_completed(&text, alternative.as_ref()).await?;

        Ok(feedback.is_structured())
    }

    async fn subject_title(&self, conversation: &Conversation) -> Option<String> {
        let id = conversation.subject_id()?;
        match self.subjects.find(id).await {
            Ok(subject) => subject.map(|s| s.title),
            Err(err) => {
                tracing::warn!(subject_id = id.as_str(), error = %err, "Subject lookup failed");
                None
            }
        }
    }

    /// Matches the recommended course title against the catalog.
    async fn resolve_alternative(&self, feedback: &ExtractedFeedback) -> Option<SubjectId> {
        let title = feedback.recommended_alternative()?;
        match self.subjects.find_by_title(title).await {
            Ok(Some(subject)) => Some(subject.id),
            Ok(None) => {
                tracing::debug!(title, "Recommended course is not in the catalog");
                None
            }
            Err(err) => {
                tracing::warn!(title, error = %err, "Recommended course lookup failed");
                None
            }
        }
    }
}
