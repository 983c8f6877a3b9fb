//! Versioned prompt templates.
//!
//! Templates are registered once through [`PromptCatalogBuilder`] during
//! startup. The frozen [`PromptCatalog`] is then shared by `Arc` and never
//! mutated again.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::foundation::ValidationError;

/// Template name: system prompt for a subject interview.
pub const INTERVIEW_SYSTEM: &str = "interview_system";
/// Template name: system prompt for the general aptitude test.
pub const APTITUDE_SYSTEM: &str = "aptitude_system";
/// Template name: opening assistant turn for the aptitude test.
pub const APTITUDE_GREETING: &str = "aptitude_greeting";
/// Template name: structured final-feedback instruction.
pub const INTERVIEW_FEEDBACK: &str = "interview_feedback";
/// Template name: free-text final-feedback instruction.
pub const INTERVIEW_FEEDBACK_PROSE: &str = "interview_feedback_prose";

/// Prompt generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptVersion {
    V1,
    #[default]
    V2,
}

impl PromptVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptVersion::V1 => "v1",
            PromptVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for PromptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(PromptVersion::V1),
            "v2" => Ok(PromptVersion::V2),
            other => Err(ValidationError::invalid_format(
                "prompt_version",
                format!("unknown prompt version '{}'", other),
            )),
        }
    }
}

/// A named, versioned template with `{placeholder}` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: String,
    pub version: PromptVersion,
    pub body: String,
    pub required_variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, version: PromptVersion, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            body: body.into(),
            required_variables: Vec::new(),
        }
    }

    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_variables = variables.into_iter().map(Into::into).collect();
        self
    }

    /// Declared variables not present in `variables`.
    pub fn missing_variables(&self, variables: &HashMap<&str, String>) -> Vec<String> {
        self.required_variables
            .iter()
            .filter(|v| !variables.contains_key(v.as_str()))
            .cloned()
            .collect()
    }

    /// Substitutes declared variables in one pass over the body, so
    /// substituted values are never rescanned. Unsupplied ones become empty.
    fn substitute(&self, variables: &HashMap<&str, String>) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let declared = after
                .find('}')
                .map(|close| &after[..close])
                .filter(|name| self.required_variables.iter().any(|v| v == name));

            match declared {
                Some(name) => {
                    if let Some(value) = variables.get(name) {
                        out.push_str(value);
                    }
                    rest = &after[name.len() + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("Prompt template '{name}' ({version}) is already registered")]
    DuplicateTemplate { name: String, version: PromptVersion },

    #[error("Prompt template '{name}' ({version}) not found")]
    TemplateNotFound { name: String, version: PromptVersion },
}

/// Collects templates before the catalog is frozen.
#[derive(Debug, Default)]
pub struct PromptCatalogBuilder {
    templates: BTreeMap<(String, PromptVersion), PromptTemplate>,
    default_version: PromptVersion,
}

impl PromptCatalogBuilder {
    pub fn new(default_version: PromptVersion) -> Self {
        Self {
            templates: BTreeMap::new(),
            default_version,
        }
    }

    /// Adds a template. `(name, version)` must be unique.
    pub fn register(&mut self, template: PromptTemplate) -> Result<&mut Self, PromptError> {
        let key = (template.name.clone(), template.version);
        if self.templates.contains_key(&key) {
            return Err(PromptError::DuplicateTemplate {
                name: key.0,
                version: key.1,
            });
        }
        self.templates.insert(key, template);
        Ok(self)
    }

    pub fn build(self) -> PromptCatalog {
        PromptCatalog {
            templates: self.templates,
            default_version: self.default_version,
        }
    }
}

/// Immutable template table.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    templates: BTreeMap<(String, PromptVersion), PromptTemplate>,
    default_version: PromptVersion,
}

impl PromptCatalog {
    pub fn builder(default_version: PromptVersion) -> PromptCatalogBuilder {
        PromptCatalogBuilder::new(default_version)
    }

    /// Catalog with every built-in template in both versions.
    pub fn standard(default_version: PromptVersion) -> Result<Self, PromptError> {
        let mut builder = Self::builder(default_version);
        for template in standard_templates() {
            builder.register(template)?;
        }
        Ok(builder.build())
    }

    pub fn default_version(&self) -> PromptVersion {
        self.default_version
    }

    pub fn get(&self, name: &str, version: Option<PromptVersion>) -> Result<&PromptTemplate, PromptError> {
        let version = version.unwrap_or(self.default_version);
        self.templates
            .get(&(name.to_string(), version))
            .ok_or_else(|| PromptError::TemplateNotFound {
                name: name.to_string(),
                version,
            })
    }

    /// Renders a template. Missing variables are logged, not fatal.
    pub fn render(
        &self,
        name: &str,
        version: Option<PromptVersion>,
        variables: &HashMap<&str, String>,
    ) -> Result<String, PromptError> {
        let template = self.get(name, version)?;
        let missing = template.missing_variables(variables);
        if !missing.is_empty() {
            warn!(
                template = %template.name,
                version = %template.version,
                missing = ?missing,
                "Rendering prompt with missing variables"
            );
        }
        Ok(template.substitute(variables))
    }

    /// Registered `(name, version)` pairs, sorted.
    pub fn list(&self) -> Vec<(&str, PromptVersion)> {
        self.templates
            .keys()
            .map(|(name, version)| (name.as_str(), *version))
            .collect()
    }
}

fn standard_templates() -> Vec<PromptTemplate> {
    use PromptVersion::{V1, V2};

    vec![
        PromptTemplate::new(INTERVIEW_SYSTEM, V1, INTERVIEW_SYSTEM_V1).with_variables([
            "subject_title",
            "subject_requirements",
            "subject_responsibilities",
        ]),
        PromptTemplate::new(INTERVIEW_SYSTEM, V2, INTERVIEW_SYSTEM_V2).with_variables([
            "subject_title",
            "subject_requirements",
            "subject_responsibilities",
            "subject_level",
        ]),
        PromptTemplate::new(APTITUDE_SYSTEM, V1, APTITUDE_SYSTEM_V1).with_variables(["candidate_name"]),
        PromptTemplate::new(APTITUDE_SYSTEM, V2, APTITUDE_SYSTEM_V2).with_variables(["candidate_name"]),
        PromptTemplate::new(APTITUDE_GREETING, V1, APTITUDE_GREETING_BODY).with_variables(["candidate_name"]),
        PromptTemplate::new(APTITUDE_GREETING, V2, APTITUDE_GREETING_BODY).with_variables(["candidate_name"]),
        PromptTemplate::new(INTERVIEW_FEEDBACK, V1, INTERVIEW_FEEDBACK_V1).with_variables(["format_instructions"]),
        PromptTemplate::new(INTERVIEW_FEEDBACK, V2, INTERVIEW_FEEDBACK_V2)
            .with_variables(["format_instructions", "subject_title"]),
        PromptTemplate::new(INTERVIEW_FEEDBACK_PROSE, V1, INTERVIEW_FEEDBACK_PROSE_V1),
        PromptTemplate::new(INTERVIEW_FEEDBACK_PROSE, V2, INTERVIEW_FEEDBACK_PROSE_V2)
            .with_variables(["subject_title"]),
    ]
}

const INTERVIEW_SYSTEM_V1: &str = "You are a virtual interviewer assessing whether a candidate is a good fit for a technical course.

Course: {subject_title}

Prerequisites:
{subject_requirements}

Skills the course develops:
{subject_responsibilities}

Run a friendly interview to judge whether the candidate has the right profile for this course.

Guidelines:
1. Ask one clear, objective question at a time
2. Assess prior knowledge, motivation and expectations
3. Be welcoming and encouraging
4. Keep each reply to at most three paragraphs
5. You will receive separate instructions for the final feedback

Start by briefly introducing yourself and asking the first question.";

const INTERVIEW_SYSTEM_V2: &str = "You are a virtual career-guidance interviewer.

## Course under evaluation
**Name:** {subject_title}
**Level:** {subject_level}

## Prerequisites
{subject_requirements}

## Skills to develop
{subject_responsibilities}

## Your mission
Run a structured interview to assess the candidate's aptitude, covering:
- Relevant prior knowledge
- Motivation and career goals
- Availability and commitment
- Realistic expectations about the course

## Interview rules
1. One clear, direct question at a time
2. Concise replies (200 words at most)
3. Professional but welcoming tone
4. Do not jump to conclusions
5. Wait for separate instructions before giving feedback

Open with a short introduction and your first question.";

const APTITUDE_SYSTEM_V1: &str = "You are a virtual interviewer running a general aptitude test with {candidate_name}.

Ask one question at a time about the candidate's interests, prior experience and learning goals, so you can later recommend a suitable course. Keep replies short and encouraging.";

const APTITUDE_SYSTEM_V2: &str = "You are a virtual career-guidance interviewer running a general aptitude test.

## Candidate
{candidate_name}

## Your mission
Discover which area best suits the candidate by exploring:
- Interests and preferred activities
- Prior education and work experience
- Comfort with computers and technology
- Short and long-term goals

## Interview rules
1. One clear, direct question at a time
2. Concise replies (200 words at most)
3. Professional but welcoming tone
4. Wait for separate instructions before giving feedback";

const APTITUDE_GREETING_BODY: &str = "Hello {candidate_name}! I will ask you a few questions to understand your interests and experience. To start: what kind of work or study do you enjoy the most?";

const INTERVIEW_FEEDBACK_V1: &str = "Give the candidate their final feedback, considering the whole conversation above.

Cover the candidate's strengths, the areas they need to develop, concrete suggestions, and an adherence percentage from 0 to 100 describing how well they fit the course. If the candidate lacks basic computer skills, recommend an introductory computing course as preparation.

{format_instructions}";

const INTERVIEW_FEEDBACK_V2: &str = "Based on the interview for the course \"{subject_title}\", write a structured assessment of the candidate.

Summarise their profile, list strengths and areas to develop, give actionable suggestions, score their adherence to the course from 0 to 100, and state clearly whether they are a fit. If a different course would suit them better, name it as the recommended alternative.

{format_instructions}";

const INTERVIEW_FEEDBACK_PROSE_V1: &str = "Give the candidate their final feedback as a short written report, considering the whole conversation above. Include strengths, areas to develop, recommendations and an adherence percentage from 0 to 100. Answer in plain prose, not JSON.";

const INTERVIEW_FEEDBACK_PROSE_V2: &str = "Based on the interview for the course \"{subject_title}\", write a short assessment report for the candidate in plain prose (no JSON). Include a profile summary, strengths, areas to develop, recommendations, an adherence percentage from 0 to 100 and a clear final verdict.";
