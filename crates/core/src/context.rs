//! Per-turn context handed to directives and tools.

use crate::message::ConversationId;
use crate::user::UserProfile;

/// Who is asking, and in which conversation.
///
/// Directives read it to personalise system text; tools read it to enforce
/// their own permissions.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub user: Option<UserProfile>,
    pub conversation_id: Option<ConversationId>,
}

impl TurnContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user: UserProfile) -> Self {
        Self {
            user: Some(user),
            conversation_id: None,
        }
    }

    pub fn with_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }
}
