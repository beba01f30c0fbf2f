//! In-memory store, for tests and ephemeral runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::StoreError;
use parley_core::store::{conversation_title, tail};
use parley_core::{ConversationId, Message, MessageStore, UserProfile};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct Conversation {
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    owners: HashMap<String, ConversationId>,
    conversations: HashMap<ConversationId, Conversation>,
}

/// Conversations held in process memory; lost on exit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored messages for a conversation.
    pub async fn len(&self, id: &ConversationId) -> usize {
        self.state
            .read()
            .await
            .conversations
            .get(id)
            .map_or(0, |c| c.messages.len())
    }
}

fn not_found(id: &ConversationId) -> StoreError {
    StoreError::ConversationNotFound(id.to_string())
}

#[async_trait]
impl MessageStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_or_create(&self, user: &UserProfile) -> Result<ConversationId, StoreError> {
        let mut state = self.state.write().await;
        if let Some(id) = state.owners.get(&user.id) {
            return Ok(id.clone());
        }

        let id = ConversationId::new();
        let now = Utc::now();
        debug!(conversation_id = %id, title = %conversation_title(user, now), "Conversation created");
        state.owners.insert(user.id.clone(), id.clone());
        state.conversations.insert(
            id.clone(),
            Conversation {
                messages: Vec::new(),
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn recent(&self, id: &ConversationId, limit: usize) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        let conversation = state.conversations.get(id).ok_or_else(|| not_found(id))?;
        Ok(tail(&conversation.messages, limit))
    }

    async fn append(&self, id: &ConversationId, messages: &[Message]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let conversation = state.conversations.get_mut(id).ok_or_else(|| not_found(id))?;
        if messages.is_empty() {
            return Ok(());
        }
        conversation.messages.extend_from_slice(messages);
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn clear(&self, id: &ConversationId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let conversation = state.conversations.get_mut(id).ok_or_else(|| not_found(id))?;
        conversation.messages.clear();
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn last_updated(&self, id: &ConversationId) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.state.read().await;
        Ok(state.conversations.get(id).map(|c| c.updated_at))
    }
}
