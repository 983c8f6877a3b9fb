//! Interview behaviour configuration

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::interview::{PromptVersion, WindowBudget, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewConfig {
    /// Assistant turns before the next submission ends the interview
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,

    #[serde(default = "default_context_max_tokens")]
    pub context_max_tokens: usize,

    #[serde(default = "default_context_max_messages")]
    pub context_max_messages: usize,

    #[serde(default)]
    pub prompt_version: PromptVersion,

    /// YAML file listing the subjects interviews can target
    pub subjects_file: Option<PathBuf>,
}

impl InterviewConfig {
    pub fn window_budget(&self) -> WindowBudget {
        WindowBudget::new(self.context_max_tokens, self.context_max_messages)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_questions == 0 {
            return Err(ValidationError::TooSmall("interview.max_questions", 1));
        }
        if self.context_max_tokens == 0 {
            return Err(ValidationError::TooSmall("interview.context_max_tokens", 1));
        }
        if self.context_max_messages < 2 {
            return Err(ValidationError::TooSmall("interview.context_max_messages", 2));
        }
        Ok(())
    }
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            max_questions: default_max_questions(),
            context_max_tokens: default_context_max_tokens(),
            context_max_messages: default_context_max_messages(),
            prompt_version: PromptVersion::default(),
            subjects_file: None,
        }
    }
}

fn default_max_questions() -> usize {
    5
}

fn default_context_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_context_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}
