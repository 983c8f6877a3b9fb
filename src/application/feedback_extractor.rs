//! Final feedback generation.
//!
//! Asks the model for a schema-constrained assessment. When the reply does
//! not parse, asks again for a prose report instead of failing the
//! interview's last turn.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::interview::{
    ContextMessage, ConversationWindow, FeedbackResult, PromptCatalog, PromptError,
    INTERVIEW_FEEDBACK, INTERVIEW_FEEDBACK_PROSE,
};

use super::invoker::{DomainAIError, DomainAIErrorKind, GenerationSettings, ResilientInvoker};

/// Prompt variables that depend on the interview.
#[derive(Debug, Clone, Default)]
pub struct FeedbackContext {
    pub subject_title: Option<String>,
}

impl FeedbackContext {
    pub fn new(subject_title: Option<String>) -> Self {
        Self { subject_title }
    }
}

/// What the extractor produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedFeedback {
    Structured(FeedbackResult),
    Fallback { text: String },
}

impl ExtractedFeedback {
    /// Text stored as the final assistant turn and as the conversation's feedback.
    pub fn feedback_text(&self) -> String {
        match self {
            ExtractedFeedback::Structured(result) => result.render_markdown(),
            ExtractedFeedback::Fallback { text } => text.clone(),
        }
    }

    pub fn recommended_alternative(&self) -> Option<&str> {
        match self {
            ExtractedFeedback::Structured(result) => result.recommended_alternative.as_deref(),
            ExtractedFeedback::Fallback { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ExtractedFeedback::Structured(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error(transparent)]
    AI(#[from] DomainAIError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

pub struct FeedbackExtractor {
    invoker: ResilientInvoker,
    catalog: Arc<PromptCatalog>,
    settings: GenerationSettings,
}

impl FeedbackExtractor {
    pub fn new(
        invoker: ResilientInvoker,
        catalog: Arc<PromptCatalog>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            invoker,
            catalog,
            settings,
        }
    }

    /// Produces the final assessment from a window ending with the
    /// candidate's last message.
    ///
    /// Parse failures and structured-mode rejections degrade to prose.
    /// Other provider errors propagate.
    pub async fn extract(
        &self,
        window: &ConversationWindow,
        context: &FeedbackContext,
    ) -> Result<ExtractedFeedback, ExtractionError> {
        let mut variables = self.variables(context);
        variables.insert("format_instructions", FeedbackResult::format_instructions());
        let instruction = self.catalog.render(INTERVIEW_FEEDBACK, None, &variables)?;

        let request = self
            .settings
            .request(with_instruction(window, instruction))
            .with_structured_schema(FeedbackResult::json_schema());

        match self.invoker.invoke(request).await {
            Ok(completion) => match FeedbackResult::parse(&completion.content) {
                Ok(result) => return Ok(ExtractedFeedback::Structured(result)),
                Err(err) => {
                    tracing::warn!(error = %err, "Structured feedback did not parse, requesting prose");
                }
            },
            Err(err) if err.kind == DomainAIErrorKind::InvalidResponse => {
                tracing::warn!(error = %err, "Structured feedback request rejected, requesting prose");
            }
            Err(err) => return Err(err.into()),
        }

        self.prose(window, context).await
    }

    async fn prose(
        &self,
        window: &ConversationWindow,
        context: &FeedbackContext,
    ) -> Result<ExtractedFeedback, ExtractionError> {
        let variables = self.variables(context);
        let instruction = self.catalog.render(INTERVIEW_FEEDBACK_PROSE, None, &variables)?;
        let request = self.settings.request(with_instruction(window, instruction));

        let completion = self.invoker.invoke(request).await?;
        let text = completion.content.trim();
        if text.is_empty() {
            return Err(DomainAIError::new(
                DomainAIErrorKind::InvalidResponse,
                "prose feedback was empty",
            )
            .into());
        }
        Ok(ExtractedFeedback::Fallback {
            text: text.to_string(),
        })
    }

    fn variables(&self, context: &FeedbackContext) -> HashMap<&'static str, String> {
        let mut variables = HashMap::new();
        variables.insert(
            "subject_title",
            context
                .subject_title
                .clone()
                .unwrap_or_else(|| "general aptitude".to_string()),
        );
        variables
    }
}

fn with_instruction(window: &ConversationWindow, instruction: String) -> Vec<ContextMessage> {
    let mut messages = window.render();
    messages.push(ContextMessage::system(instruction));
    messages
}
