//! In-memory conversation store.
//!
//! Each conversation has its own async mutex. An exchange holds that mutex
//! from `begin_exchange` until it is committed or dropped, so submissions for
//! one conversation are serialized while reads and other conversations
//! proceed freely.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::foundation::{ConversationId, SubjectId};
use crate::domain::interview::{Conversation, Turn};
use crate::ports::{ConversationExchange, ConversationRepository, RepositoryError};

#[derive(Debug)]
struct Slot {
    lock: Arc<Mutex<()>>,
    committed: Conversation,
}

type Store = Arc<RwLock<HashMap<ConversationId, Slot>>>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationRepository {
    store: Store,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        if store.contains_key(&conversation.id()) {
            return Err(RepositoryError::Conflict(format!(
                "conversation {} already exists",
                conversation.id()
            )));
        }
        store.insert(
            conversation.id(),
            Slot {
                lock: Arc::new(Mutex::new(())),
                committed: conversation.clone(),
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.store.read().await.get(&id).map(|slot| slot.committed.clone()))
    }

    async fn begin_exchange(
        &self,
        id: ConversationId,
    ) -> Result<Box<dyn ConversationExchange>, RepositoryError> {
        let lock = self
            .store
            .read()
            .await
            .get(&id)
            .map(|slot| slot.lock.clone())
            .ok_or(RepositoryError::NotFound(id))?;

        let guard = lock.lock_owned().await;

        // Snapshot after acquiring, so a previous holder's commit is visible.
        let staged = self
            .store
            .read()
            .await
            .get(&id)
            .map(|slot| slot.committed.clone())
            .ok_or(RepositoryError::NotFound(id))?;

        Ok(Box::new(InMemoryExchange {
            store: self.store.clone(),
            _guard: guard,
            staged,
        }))
    }
}

struct InMemoryExchange {
    store: Store,
    _guard: OwnedMutexGuard<()>,
    staged: Conversation,
}

fn conflict(err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Conflict(err.to_string())
}

#[async_trait]
impl ConversationExchange for InMemoryExchange {
    fn conversation(&self) -> &Conversation {
        &self.staged
    }

    async fn append_turn(&mut self, turn: &Turn) -> Result<(), RepositoryError> {
        self.staged.apply_turn(turn.clone()).map_err(conflict)
    }

    async fn mark_completed(
        &mut self,
        feedback: &str,
        recommended_alternative: Option<&SubjectId>,
    ) -> Result<(), RepositoryError> {
        self.staged
            .complete(feedback, recommended_alternative.cloned())
            .map_err(conflict)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryExchange {
            store,
            _guard,
            staged,
        } = *self;
        let id = staged.id();
        let mut store = store.write().await;
        let slot = store.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        slot.committed = staged;
        Ok(())
    }
}
