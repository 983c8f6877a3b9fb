//! Subjects an interview can be about (courses, roles, skills).
//!
//! Subjects are owned by an external catalog; the interview only reads them.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::SubjectId;

/// A catalog entry the candidate is interviewed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub title: String,
    #[serde(default)]
    pub requirements: String,
    #[serde(default)]
    pub responsibilities: String,
    #[serde(default)]
    pub level: Option<String>,
}

impl Subject {
    pub fn new(id: SubjectId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            requirements: String::new(),
            responsibilities: String::new(),
            level: None,
        }
    }

    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = requirements.into();
        self
    }

    pub fn with_responsibilities(mut self, responsibilities: impl Into<String>) -> Self {
        self.responsibilities = responsibilities.into();
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Case-insensitive title comparison, ignoring surrounding whitespace.
    pub fn title_matches(&self, title: &str) -> bool {
        self.title.trim().to_lowercase() == title.trim().to_lowercase()
    }
}
