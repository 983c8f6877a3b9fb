//! LLM provider adapters.
//!
//! - `OpenAIProvider` - OpenAI-compatible chat completions
//! - `GeminiProvider` - Google Gemini `generateContent`
//! - `MockProvider` - queued replies for tests
//! - `LlmProvider` - the closed set, resolved from configuration

mod gemini_provider;
mod http_errors;
mod mock_provider;
mod openai_provider;
mod provider;

pub use gemini_provider::{GeminiConfig, GeminiProvider};
pub use mock_provider::{MockProvider, MockResponse, DEFAULT_MOCK_REPLY};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};
pub use provider::LlmProvider;
