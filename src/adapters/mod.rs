//! Adapters - Implementations of port interfaces.
//!
//! - `ai` - LLM provider clients (OpenAI, Gemini, mock)
//! - `http` - axum REST surface
//! - `memory` - in-process conversation store and subject catalog
//! - `postgres` - PostgreSQL conversation store
//! - `rate_limiter` - admission counters (in-memory, Redis)

pub mod ai;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod rate_limiter;
