//! Structured final assessment of a candidate.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Why a model reply could not be read as a [`FeedbackResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackParseError {
    #[error("Feedback is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Adherence must be between 0 and 100, got {0}")]
    AdherenceOutOfRange(i64),

    #[error("Feedback summary is empty")]
    EmptySummary,
}

/// Wire shape accepted from the model. Ranges are checked afterwards.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeedback {
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    suggestions: Vec<String>,
    adherence_percent: i64,
    #[serde(default)]
    recommended_alternative: Option<String>,
    summary: String,
    is_fit: bool,
}

/// The candidate's assessment. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub adherence_percent: u8,
    pub recommended_alternative: Option<String>,
    pub summary: String,
    pub is_fit: bool,
}

impl FeedbackResult {
    /// Reads a model reply: bare JSON, a fenced block, or the first `{...}` object.
    ///
    /// Out-of-range adherence fails rather than clamping.
    pub fn parse(raw: &str) -> Result<Self, FeedbackParseError> {
        let json = extract_json_object(raw);
        let parsed: RawFeedback = serde_json::from_str(json)
            .map_err(|e| FeedbackParseError::InvalidJson(e.to_string()))?;

        if !(0..=100).contains(&parsed.adherence_percent) {
            return Err(FeedbackParseError::AdherenceOutOfRange(parsed.adherence_percent));
        }
        let summary = parsed.summary.trim();
        if summary.is_empty() {
            return Err(FeedbackParseError::EmptySummary);
        }

        Ok(Self {
            strengths: parsed.strengths,
            weaknesses: parsed.weaknesses,
            suggestions: parsed.suggestions,
            adherence_percent: parsed.adherence_percent as u8,
            recommended_alternative: parsed
                .recommended_alternative
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            summary: summary.to_string(),
            is_fit: parsed.is_fit,
        })
    }

    /// Text stored as the final assistant turn.
    pub fn render_markdown(&self) -> String {
        let bullets = |items: &[String]| -> String {
            if items.is_empty() {
                return "  - (none)".to_string();
            }
            items
                .iter()
                .map(|i| format!("  - {}", i))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let verdict = if self.is_fit { "FIT" } else { "NEEDS DEVELOPMENT" };

        let mut text = format!(
            "## Interview feedback\n\n\
             ### Summary\n{}\n\n\
             ### Strengths\n{}\n\n\
             ### Areas to develop\n{}\n\n\
             ### Suggestions\n{}\n\n\
             ### Result\n\
             - **Adherence to the course:** {}%\n\
             - **Status:** {}\n",
            self.summary,
            bullets(&self.strengths),
            bullets(&self.weaknesses),
            bullets(&self.suggestions),
            self.adherence_percent,
            verdict,
        );
        if let Some(course) = &self.recommended_alternative {
            text.push_str(&format!("- **Recommended course:** {}\n", course));
        }
        text.trim_end().to_string()
    }

    /// Instructions appended to the feedback prompt describing the expected JSON.
    pub fn format_instructions() -> String {
        let schema = serde_json::to_string_pretty(&Self::json_schema()).unwrap_or_default();
        format!(
            "Reply with a single JSON object that conforms to the schema below. \
             Return ONLY the JSON, with no additional text.\n\n```json\n{}\n```",
            schema
        )
    }

    /// JSON schema for providers that support constrained output.
    pub fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "strengths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Positive points identified in the candidate's answers"
                },
                "weaknesses": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Gaps or weak points identified"
                },
                "suggestions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Concrete improvement suggestions for the candidate"
                },
                "adherence_percent": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 100,
                    "description": "How well the candidate fits the course (0-100)"
                },
                "recommended_alternative": {
                    "type": ["string", "null"],
                    "description": "Title of an alternative course, if one suits the candidate better"
                },
                "summary": {
                    "type": "string",
                    "description": "Overall summary of the candidate's performance"
                },
                "is_fit": {
                    "type": "boolean",
                    "description": "Whether the candidate is fit for the course"
                }
            },
            "required": [
                "strengths", "weaknesses", "suggestions", "adherence_percent",
                "recommended_alternative", "summary", "is_fit"
            ],
            "additionalProperties": false
        })
    }
}

/// Best-effort location of a JSON object inside model prose.
fn extract_json_object(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(fenced) = extract_fenced(trimmed) {
        return fenced;
    }
    if let Some(start) = trimmed.find('{') {
        if let Some(object) = extract_balanced(&trimmed[start..]) {
            return object;
        }
    }
    trimmed
}

fn extract_fenced(s: &str) -> Option<&str> {
    for opener in ["```json", "```JSON", "```"] {
        if let Some(start) = s.find(opener) {
            let body_start = start + opener.len();
            if let Some(len) = s[body_start..].find("```") {
                let body = s[body_start..body_start + len].trim();
                if body.starts_with('{') {
                    return Some(body);
                }
            }
        }
    }
    None
}

/// `s` starts at `{`; returns the slice up to its matching `}`.
fn extract_balanced(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(adherence: i64) -> String {
        format!(
            r#"{{
                "strengths": ["Motivated"],
                "weaknesses": ["Little practice"],
                "suggestions": ["Study logic"],
                "adherence_percent": {},
                "recommended_alternative": null,
                "summary": "Good potential.",
                "is_fit": true
            }}"#,
            adherence
        )
    }

    mod parse {
        use super::*;

        #[test]
        fn reads_bare_json() {
            let feedback = FeedbackResult::parse(&payload(42)).unwrap();

            assert_eq!(feedback.adherence_percent, 42);
            assert_eq!(feedback.strengths, vec!["Motivated".to_string()]);
            assert!(feedback.is_fit);
        }

        #[test]
        fn reads_fenced_block() {
            let raw = format!("Here you go:\n```json\n{}\n```\nThanks", payload(80));
            assert_eq!(FeedbackResult::parse(&raw).unwrap().adherence_percent, 80);
        }

        #[test]
        fn reads_object_embedded_in_prose() {
            let raw = format!("Sure! {} Hope this helps.", payload(10));
            assert_eq!(FeedbackResult::parse(&raw).unwrap().adherence_percent, 10);
        }

        #[test]
        fn braces_inside_strings_do_not_confuse_extraction() {
            let raw = r#"note {"strengths": ["uses {} well"], "weaknesses": [], "suggestions": [],
                "adherence_percent": 5, "summary": "ok, ção", "is_fit": false} tail"#;
            let feedback = FeedbackResult::parse(raw).unwrap();

            assert_eq!(feedback.strengths[0], "uses {} well");
            assert_eq!(feedback.recommended_alternative, None);
        }

        #[test]
        fn boundaries_are_accepted() {
            assert!(FeedbackResult::parse(&payload(0)).is_ok());
            assert!(FeedbackResult::parse(&payload(100)).is_ok());
        }

        #[test]
        fn out_of_range_adherence_fails() {
            assert_eq!(
                FeedbackResult::parse(&payload(150)),
                Err(FeedbackParseError::AdherenceOutOfRange(150))
            );
            assert!(FeedbackResult::parse(&payload(-1)).is_err());
        }

        #[test]
        fn missing_field_fails() {
            let raw = r#"{"strengths": [], "weaknesses": [], "suggestions": [], "summary": "x", "is_fit": true}"#;
            assert!(matches!(
                FeedbackResult::parse(raw),
                Err(FeedbackParseError::InvalidJson(_))
            ));
        }

        #[test]
        fn wrong_type_fails() {
            let raw = payload(50).replace("true", "\"yes\"");
            assert!(FeedbackResult::parse(&raw).is_err());
        }

        #[test]
        fn empty_summary_fails() {
            let raw = payload(50).replace("Good potential.", "  ");
            assert_eq!(FeedbackResult::parse(&raw), Err(FeedbackParseError::EmptySummary));
        }

        #[test]
        fn prose_fails() {
            assert!(FeedbackResult::parse("The candidate did well overall.").is_err());
        }

        #[test]
        fn blank_recommendation_becomes_none() {
            let raw = payload(50).replace("null", "\"  \"");
            assert_eq!(FeedbackResult::parse(&raw).unwrap().recommended_alternative, None);
        }
    }

    mod rendering {
        use super::*;

        #[test]
        fn markdown_contains_every_section() {
            let mut feedback = FeedbackResult::parse(&payload(75)).unwrap();
            feedback.recommended_alternative = Some("Intro to Computing".to_string());
            let text = feedback.render_markdown();

            assert!(text.contains("### Summary\nGood potential."));
            assert!(text.contains("### Strengths\n  - Motivated"));
            assert!(text.contains("### Areas to develop\n  - Little practice"));
            assert!(text.contains("### Suggestions\n  - Study logic"));
            assert!(text.contains("**Adherence to the course:** 75%"));
            assert!(text.contains("**Status:** FIT"));
            assert!(text.ends_with("**Recommended course:** Intro to Computing"));
        }

        #[test]
        fn unfit_candidate_needs_development() {
            let raw = payload(20).replace("true", "false");
            let text = FeedbackResult::parse(&raw).unwrap().render_markdown();

            assert!(text.contains("NEEDS DEVELOPMENT"));
            assert!(!text.contains("Recommended course"));
        }

        #[test]
        fn format_instructions_embed_schema() {
            let instructions = FeedbackResult::format_instructions();
            assert!(instructions.contains("\"adherence_percent\""));
            assert!(instructions.contains("ONLY the JSON"));
        }
    }
}
