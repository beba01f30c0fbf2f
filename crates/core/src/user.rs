//! The authenticated caller of a chat turn.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user id; owns exactly one conversation.
    pub id: String,

    pub display_name: String,

    /// Login handle, rendered as `@handle`
    #[serde(default)]
    pub handle: String,

    /// Site roles, most significant first
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            handle: String::new(),
            roles: Vec::new(),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// The role shown for the current site.
    pub fn current_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }
}
