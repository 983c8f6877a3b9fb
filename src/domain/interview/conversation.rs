//! The interview conversation aggregate.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, StateMachine, SubjectId, Timestamp, ValidationError,
};

use super::subject::Subject;
use super::turn::{Turn, TurnRole};

/// Bounds on a candidate message, in characters after trimming.
pub const MESSAGE_MIN_CHARS: usize = 2;
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Upper bound on a candidate name, in characters after trimming.
pub const CANDIDATE_NAME_MAX_CHARS: usize = 100;

/// A validated message submitted by the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMessage(String);

impl CandidateMessage {
    /// Trims the input and checks its length.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len == 0 {
            return Err(ValidationError::empty_field("content"));
        }
        if !(MESSAGE_MIN_CHARS..=MESSAGE_MAX_CHARS).contains(&len) {
            return Err(ValidationError::length(
                "content",
                MESSAGE_MIN_CHARS,
                MESSAGE_MAX_CHARS,
                len,
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Normalizes an optional candidate name: blank means absent.
pub fn normalize_candidate_name(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(name) = raw.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let len = name.chars().count();
    if len > CANDIDATE_NAME_MAX_CHARS {
        return Err(ValidationError::length(
            "candidate_name",
            1,
            CANDIDATE_NAME_MAX_CHARS,
            len,
        ));
    }
    Ok(Some(name.to_string()))
}

/// Lifecycle of an interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    /// Accepting candidate messages.
    #[default]
    Open,
    /// Feedback attached; read-only.
    Completed,
}

impl StateMachine for InterviewStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (Self::Open, Self::Completed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Open => vec![Self::Completed],
            Self::Completed => vec![],
        }
    }
}

/// An interview between the model and a candidate.
///
/// Owns its turns. Turns are only ever appended, and the status only moves
/// from `Open` to `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    subject_id: Option<SubjectId>,
    candidate_name: Option<String>,
    title: String,
    status: InterviewStatus,
    feedback: Option<String>,
    recommended_alternative: Option<SubjectId>,
    turns: Vec<Turn>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Conversation {
    /// Starts an interview, seeding the system turn and an optional greeting.
    pub fn start(
        subject: Option<&Subject>,
        candidate_name: Option<String>,
        system_prompt: impl Into<String>,
        greeting: Option<String>,
    ) -> Self {
        let id = ConversationId::new();
        let now = Timestamp::now();
        let title = match subject {
            Some(subject) => format!("Interview {} - {}", subject.title, id),
            None => format!("Aptitude test - {}", id),
        };

        let mut turns = vec![Turn::system(system_prompt)];
        if let Some(greeting) = greeting {
            turns.push(Turn::assistant(greeting));
        }

        Self {
            id,
            subject_id: subject.map(|s| s.id.clone()),
            candidate_name,
            title,
            status: InterviewStatus::Open,
            feedback: None,
            recommended_alternative: None,
            turns,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a conversation loaded from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: ConversationId,
        subject_id: Option<SubjectId>,
        candidate_name: Option<String>,
        title: String,
        status: InterviewStatus,
        feedback: Option<String>,
        recommended_alternative: Option<SubjectId>,
        turns: Vec<Turn>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            subject_id,
            candidate_name,
            title,
            status,
            feedback,
            recommended_alternative,
            turns,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn subject_id(&self) -> Option<&SubjectId> {
        self.subject_id.as_ref()
    }

    pub fn candidate_name(&self) -> Option<&str> {
        self.candidate_name.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> InterviewStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == InterviewStatus::Completed
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn recommended_alternative(&self) -> Option<&SubjectId> {
        self.recommended_alternative.as_ref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// The leading system turn, if any.
    pub fn system_turn(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.role() == TurnRole::System)
    }

    /// Turns the candidate is allowed to see.
    pub fn visible_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.is_visible())
    }

    pub fn assistant_turn_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role() == TurnRole::Assistant)
            .count()
    }

    /// Appends the candidate's message. Rejected once completed.
    pub fn append_candidate_turn(
        &mut self,
        message: CandidateMessage,
    ) -> Result<&Turn, ValidationError> {
        self.ensure_open()?;
        self.push(Turn::user(message.into_inner()));
        Ok(self.last_turn())
    }

    /// Appends a model reply. Rejected once completed.
    pub fn append_assistant_turn(
        &mut self,
        content: impl Into<String>,
    ) -> Result<&Turn, ValidationError> {
        self.ensure_open()?;
        self.push(Turn::assistant(content));
        Ok(self.last_turn())
    }

    /// Appends an already-built turn, as replayed by a unit of work.
    pub fn apply_turn(&mut self, turn: Turn) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.push(turn);
        Ok(())
    }

    /// Attaches final feedback and closes the interview.
    pub fn complete(
        &mut self,
        feedback: impl Into<String>,
        recommended_alternative: Option<SubjectId>,
    ) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(InterviewStatus::Completed)?;
        self.feedback = Some(feedback.into());
        self.recommended_alternative = recommended_alternative;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.is_completed() {
            return Err(ValidationError::invalid_format(
                "status",
                "conversation is already completed",
            ));
        }
        Ok(())
    }

    fn push(&mut self, turn: Turn) {
        self.updated_at = turn.created_at();
        self.turns.push(turn);
    }

    fn last_turn(&self) -> &Turn {
        // push always precedes this call
        &self.turns[self.turns.len() - 1]
    }
}
