//! Google Gemini `generateContent` provider.
//!
//! Gemini has no system role and expects alternating `user`/`model` turns.
//! System turns are folded into the next user turn and consecutive turns of
//! the same role are merged before sending.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::interview::{ContextMessage, TurnRole};
use crate::ports::{
    CompletionRequest, FinishReason, ProviderClient, RawCompletion, TokenUsage, TransportError,
    TransportErrorKind, CONTEXT_LENGTH_CODE,
};

use super::http_errors;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.config.base_url, self.config.model)
    }

    fn to_gemini_request(&self, request: &CompletionRequest) -> GeminiRequest {
        GeminiRequest {
            contents: shape_contents(&request.messages),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
                response_mime_type: request
                    .structured_schema
                    .as_ref()
                    .map(|_| "application/json"),
            },
        }
    }
}

/// Folds system turns into the following user turn and merges same-role runs.
fn shape_contents(messages: &[ContextMessage]) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut pending_system: Vec<&str> = Vec::new();

    for message in messages {
        match message.role {
            TurnRole::System => pending_system.push(&message.content),
            TurnRole::User => {
                pending_system.push(&message.content);
                push_merged(&mut contents, "user", pending_system.join("\n\n"));
                pending_system.clear();
            }
            TurnRole::Assistant => {
                // model turns can't lead; flush instructions as a user turn first
                if !pending_system.is_empty() {
                    push_merged(&mut contents, "user", pending_system.join("\n\n"));
                    pending_system.clear();
                }
                push_merged(&mut contents, "model", message.content.clone());
            }
        }
    }
    if !pending_system.is_empty() {
        push_merged(&mut contents, "user", pending_system.join("\n\n"));
    }
    contents
}

fn push_merged(contents: &mut Vec<GeminiContent>, role: &'static str, text: String) {
    match contents.last_mut() {
        Some(last) if last.role == role => {
            if let Some(part) = last.parts.last_mut() {
                part.text.push_str("\n\n");
                part.text.push_str(&text);
            } else {
                last.parts.push(GeminiPart { text });
            }
        }
        _ => contents.push(GeminiContent {
            role,
            parts: vec![GeminiPart { text }],
        }),
    }
}

/// Gemini reports an over-long input and a bad key as generic 400s.
fn refine_error(err: TransportError, body: &str) -> TransportError {
    match &err.kind {
        TransportErrorKind::BadRequest { .. } if body.contains("API_KEY_INVALID") => {
            TransportError::unauthorized("Provider rejected credentials (400)")
        }
        TransportErrorKind::BadRequest { .. }
            if err.message.contains("exceeds the maximum number of tokens") =>
        {
            TransportError::bad_request(Some(CONTEXT_LENGTH_CODE.to_string()), err.message)
        }
        _ => err,
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
            FinishReason::ContentFilter
        }
        Some(_) => FinishReason::Other,
    }
}

fn parse_completion(body: GeminiResponse, fallback_model: &str) -> Result<RawCompletion, TransportError> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        let reason = body
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(TransportError::malformed(format!("Empty Gemini response: {}", reason)));
    };

    let content: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(TransportError::malformed("Empty completion content"));
    }

    let usage = body
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u
                .total_token_count
                .unwrap_or(u.prompt_token_count.saturating_add(u.candidates_token_count)),
        })
        .unwrap_or_default();

    let mut completion = RawCompletion::new(
        content,
        body.model_version.unwrap_or_else(|| fallback_model.to_string()),
    )
    .with_usage(usage)
    .with_finish_reason(parse_finish_reason(candidate.finish_reason.as_deref()));
    if let Some(id) = body.response_id {
        completion = completion.with_request_id(id);
    }
    Ok(completion)
}

#[async_trait]
impl ProviderClient for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, TransportError> {
        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&self.to_gemini_request(&request))
            .send()
            .await
            .map_err(http_errors::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(refine_error(http_errors::from_status(status, &headers, &body), &body));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| TransportError::malformed(format!("Failed to parse response: {}", e)))?;

        parse_completion(body, &self.config.model)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ----- Gemini API Types -----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, PartialEq)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, PartialEq)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
