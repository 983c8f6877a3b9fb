//! PostgreSQL adapters.
//!
//! - `PostgresConversationRepository` - conversations and their turn log,
//!   with row-locked exchanges

mod conversation_repository;

pub use conversation_repository::PostgresConversationRepository;
