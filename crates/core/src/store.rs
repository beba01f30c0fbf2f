//! Message store trait — durable conversation history.
//!
//! Each user owns exactly one conversation. History grows without bound;
//! callers read only a recent window into context.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::message::{ConversationId, Message};
use crate::user::UserProfile;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Backend name, for logs (e.g., "sqlite").
    fn name(&self) -> &str;

    /// The caller's conversation, created on first use.
    async fn get_or_create(&self, user: &UserProfile) -> Result<ConversationId, StoreError>;

    /// The last `limit` messages, oldest first.
    async fn recent(&self, id: &ConversationId, limit: usize)
        -> Result<Vec<Message>, StoreError>;

    /// Append in order. Either every message lands or none do; an empty
    /// slice changes nothing.
    async fn append(&self, id: &ConversationId, messages: &[Message]) -> Result<(), StoreError>;

    /// Replace the history with an empty sequence.
    async fn clear(&self, id: &ConversationId) -> Result<(), StoreError>;

    async fn last_updated(&self, id: &ConversationId)
        -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Title given to a newly created conversation.
pub fn conversation_title(user: &UserProfile, now: DateTime<Utc>) -> String {
    format!("Chat - {} - {}", user.display_name, now.format("%Y-%m-%d %H:%M:%S"))
}

/// Slice out the last `limit` items.
pub fn tail<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items[items.len().saturating_sub(limit)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn title_includes_name_and_date() {
        let user = UserProfile::new("7", "Sam");
        let when = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(conversation_title(&user, when), "Chat - Sam - 2026-03-01 09:30:00");
    }

    #[test]
    fn tail_takes_most_recent() {
        let items: Vec<u32> = (0..25).collect();
        let last = tail(&items, 20);
        assert_eq!(last.len(), 20);
        assert_eq!(last[0], 5);
        assert_eq!(last[19], 24);
        assert_eq!(tail(&items[..3], 20), vec![0, 1, 2]);
    }
}
