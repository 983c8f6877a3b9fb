//! In-memory adapters for development and tests.

mod conversation_repository;
mod subject_catalog;

pub use conversation_repository::InMemoryConversationRepository;
pub use subject_catalog::InMemorySubjectCatalog;
