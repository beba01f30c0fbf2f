//! File-based store — one JSON-lines log per conversation.
//!
//! Layout under the store directory:
//! - `conversations.json`: index of conversations (owner, title, timestamps)
//! - `<conversation-id>.jsonl`: the conversation's messages, one per line
//!
//! The index is loaded on open and rewritten on every mutation. Messages are
//! only ever appended, so history survives a crash mid-turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::StoreError;
use parley_core::store::{conversation_title, tail};
use parley_core::{ConversationId, Message, MessageStore, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const INDEX_FILE: &str = "conversations.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationMeta {
    owner: String,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct FileStore {
    dir: PathBuf,
    index: Mutex<HashMap<String, ConversationMeta>>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Storage(format!("Failed to create store directory: {e}")))?;

        let index = Self::load_index(&dir.join(INDEX_FILE))?;
        debug!(path = %dir.display(), conversations = index.len(), "File store loaded");
        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    fn load_index(path: &Path) -> Result<HashMap<String, ConversationMeta>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Storage(format!("Failed to read index: {e}"))),
        };
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Storage(format!("Corrupted conversation index: {e}")))
    }

    fn flush_index(&self, index: &HashMap<String, ConversationMeta>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(index)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize index: {e}")))?;
        // Atomic replace via rename
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        std::fs::write(&tmp, content)
            .and_then(|_| std::fs::rename(&tmp, self.dir.join(INDEX_FILE)))
            .map_err(|e| StoreError::Storage(format!("Failed to write index: {e}")))
    }

    fn log_path(&self, id: &ConversationId) -> PathBuf {
        self.dir.join(format!("{id}.jsonl"))
    }

    fn read_log(&self, id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let content = match std::fs::read_to_string(self.log_path(id)) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::QueryFailed(format!("Failed to read history: {e}"))),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Message>(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(conversation_id = %id, error = %e, "Skipping corrupted message line");
                    None
                }
            })
            .collect())
    }
}

fn not_found(id: &ConversationId) -> StoreError {
    StoreError::ConversationNotFound(id.to_string())
}

#[async_trait]
impl MessageStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_or_create(&self, user: &UserProfile) -> Result<ConversationId, StoreError> {
        let mut index = self.index.lock().await;
        if let Some((id, _)) = index.iter().find(|(_, meta)| meta.owner == user.id) {
            return Ok(ConversationId::from(id));
        }

        let id = ConversationId::new();
        let now = Utc::now();
        index.insert(
            id.to_string(),
            ConversationMeta {
                owner: user.id.clone(),
                title: conversation_title(user, now),
                created_at: now,
                updated_at: now,
            },
        );
        self.flush_index(&index)?;
        debug!(conversation_id = %id, user_id = %user.id, "Conversation created");
        Ok(id)
    }

    async fn recent(&self, id: &ConversationId, limit: usize) -> Result<Vec<Message>, StoreError> {
        let index = self.index.lock().await;
        if !index.contains_key(id.as_str()) {
            return Err(not_found(id));
        }
        let messages = self.read_log(id)?;
        Ok(tail(&messages, limit))
    }

    async fn append(&self, id: &ConversationId, messages: &[Message]) -> Result<(), StoreError> {
        let mut index = self.index.lock().await;
        let meta = index.get_mut(id.as_str()).ok_or_else(|| not_found(id))?;
        if messages.is_empty() {
            return Ok(());
        }

        let mut buffer = String::new();
        for message in messages {
            let line = serde_json::to_string(message)
                .map_err(|e| StoreError::Storage(format!("Failed to serialize message: {e}")))?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(id))
            .and_then(|mut file| file.write_all(buffer.as_bytes()))
            .map_err(|e| StoreError::Storage(format!("Failed to append history: {e}")))?;

        meta.updated_at = Utc::now();
        self.flush_index(&index)
    }

    async fn clear(&self, id: &ConversationId) -> Result<(), StoreError> {
        let mut index = self.index.lock().await;
        let meta = index.get_mut(id.as_str()).ok_or_else(|| not_found(id))?;
        std::fs::write(self.log_path(id), "")
            .map_err(|e| StoreError::Storage(format!("Failed to clear history: {e}")))?;
        meta.updated_at = Utc::now();
        self.flush_index(&index)
    }

    async fn last_updated(&self, id: &ConversationId) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.index.lock().await.get(id.as_str()).map(|m| m.updated_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("history")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn conversation_per_user() {
        let (_dir, store) = store();
        conformance::conversation_per_user(&store).await;
    }

    #[tokio::test]
    async fn recent_window_keeps_latest() {
        let (_dir, store) = store();
        conformance::recent_window_keeps_latest(&store).await;
    }

    #[tokio::test]
    async fn clear_round_trip() {
        let (_dir, store) = store();
        conformance::clear_round_trip(&store).await;
    }

    #[tokio::test]
    async fn append_preserves_message_shapes() {
        let (_dir, store) = store();
        conformance::append_preserves_message_shapes(&store).await;
    }

    #[tokio::test]
    async fn unknown_conversation_is_an_error() {
        let (_dir, store) = store();
        conformance::unknown_conversation_is_an_error(&store).await;
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserProfile::new("9", "Robin");

        let id = {
            let store = FileStore::open(dir.path()).unwrap();
            let id = store.get_or_create(&user).await.unwrap();
            store.append(&id, &[Message::user("remember me")]).await.unwrap();
            id
        };

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_or_create(&user).await.unwrap(), id);
        let recent = reopened.recent(&id, 20).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content(), Some("remember me"));
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let (_dir, store) = store();
        let id = store.get_or_create(&UserProfile::new("1", "A")).await.unwrap();
        store.append(&id, &[Message::user("first")]).await.unwrap();

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.log_path(&id))
            .unwrap();
        writeln!(file, "{{not json").unwrap();
        drop(file);

        store.append(&id, &[Message::user("second")]).await.unwrap();
        let recent = store.recent(&id, 20).await.unwrap();
        let contents: Vec<_> = recent.iter().filter_map(|m| m.content()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }
}
