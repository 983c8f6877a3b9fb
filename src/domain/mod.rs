//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `interview` - Interview conversations, context windows, prompts and feedback

pub mod foundation;
pub mod interview;
