//! Chat service — the request entry point.
//!
//! Authenticates the caller, sanitises the text, loads the recent history
//! window, runs one turn and persists what the turn added. Turns for the same
//! conversation are serialised.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::{
    ConversationId, Error, Message, MessageStore, Role, ToolCallRecord, ToolRegistry, TurnContext,
    UserProfile,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::loop_runner::ConversationLoop;

pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// What a successful turn returns to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    #[serde(rename = "message")]
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub timestamp: DateTime<Utc>,
}

pub struct ChatService {
    runner: ConversationLoop,
    store: Arc<dyn MessageStore>,
    event_bus: Arc<EventBus>,
    history_window: usize,
    turn_locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(runner: ConversationLoop, store: Arc<dyn MessageStore>, event_bus: Arc<EventBus>) -> Self {
        Self {
            runner,
            store,
            event_bus,
            history_window: DEFAULT_HISTORY_WINDOW,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored messages sent as context on each turn.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.runner.tools()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    async fn turn_lock(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        self.turn_locks
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    /// Forget the conversation's lock once no turn holds or awaits it.
    /// Clones are only handed out under the map lock, so a count of one
    /// means the map owns the last reference.
    async fn release_turn_lock(&self, id: &ConversationId) {
        let mut locks = self.turn_locks.lock().await;
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }

    /// Handle one user message.
    pub async fn send_message(&self, caller: Option<&UserProfile>, raw: &str) -> Result<ChatReply, Error> {
        let user = caller.ok_or(Error::Unauthenticated)?;
        let text = sanitize(raw);
        if text.is_empty() {
            return Err(Error::EmptyInput);
        }

        let id = self.store.get_or_create(user).await.inspect_err(|e| {
            error!(user_id = %user.id, error = %e, "Could not open conversation");
        })?;

        let lock = self.turn_lock(&id).await;
        let result = {
            let _turn = lock.lock().await;
            self.run_turn(user, &id, text).await
        };
        drop(lock);
        self.release_turn_lock(&id).await;
        result
    }

    async fn run_turn(&self, user: &UserProfile, id: &ConversationId, text: String) -> Result<ChatReply, Error> {
        self.event_bus.publish(DomainEvent::TurnStarted {
            conversation_id: id.to_string(),
            user_id: user.id.clone(),
            timestamp: Utc::now(),
        });

        let mut messages = trim_orphaned_results(self.store.recent(id, self.history_window).await?);
        let first_new = messages.len();
        messages.push(Message::user(text));

        let ctx = TurnContext::for_user(user.clone()).with_conversation(id.clone());
        let outcome = match self.runner.run(messages, &ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    conversation_id = %id,
                    code = e.code(),
                    model_behavior = e.is_model_behavior(),
                    error = %e,
                    "Chat turn failed"
                );
                self.event_bus.publish(DomainEvent::TurnFailed {
                    conversation_id: id.to_string(),
                    code: e.code().to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };

        self.store.append(id, &outcome.messages[first_new..]).await?;
        info!(
            conversation_id = %id,
            saved = outcome.messages.len() - first_new,
            "Turn persisted"
        );

        Ok(ChatReply {
            content: outcome.content,
            tool_calls: outcome.tool_calls,
            timestamp: Utc::now(),
        })
    }

    /// Empty the caller's conversation.
    pub async fn clear_history(&self, caller: Option<&UserProfile>) -> Result<(), Error> {
        let user = caller.ok_or(Error::Unauthenticated)?;
        let id = self.store.get_or_create(user).await?;

        let lock = self.turn_lock(&id).await;
        let cleared = {
            let _turn = lock.lock().await;
            self.store.clear(&id).await
        };
        drop(lock);
        self.release_turn_lock(&id).await;
        cleared?;

        self.event_bus.publish(DomainEvent::HistoryCleared {
            conversation_id: id.to_string(),
            timestamp: Utc::now(),
        });
        info!(conversation_id = %id, user_id = %user.id, "Chat history cleared");
        Ok(())
    }

    /// The caller's recent history window.
    pub async fn history(&self, caller: Option<&UserProfile>) -> Result<Vec<Message>, Error> {
        let user = caller.ok_or(Error::Unauthenticated)?;
        let id = self.store.get_or_create(user).await?;
        Ok(self.store.recent(&id, self.history_window).await?)
    }
}

/// A window can start inside an earlier turn; results whose request fell
/// outside it are dropped.
fn trim_orphaned_results(messages: Vec<Message>) -> Vec<Message> {
    let skip = messages.iter().take_while(|m| m.role() == Role::Tool).count();
    messages.into_iter().skip(skip).collect()
}

/// Strip markup and control characters, then trim.
///
/// Newlines and tabs survive. A `<` that does not open a tag is kept.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        match after.find('>') {
            Some(end) if opens_tag => rest = &after[end + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}
