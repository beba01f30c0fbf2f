//! The chat orchestration layer.
//!
//! A turn follows a **call → act → observe** cycle:
//!
//! 1. **Receive** a user message through [`ChatService::send_message`]
//! 2. **Build the request**: recent history, the new message, then the
//!    system directives
//! 3. **Call the model** with the registry's tool descriptors
//! 4. **If tool calls**: run them in order, append results, go back to 3
//! 5. **If text**: persist the turn and return the reply
//!
//! The loop stops at the first plain-text answer or after
//! `max_iterations` model calls.

pub mod chat;
pub mod directives;
pub mod loop_runner;
pub mod runtime;

pub use chat::{ChatReply, ChatService};
pub use directives::pipeline_from_config;
pub use loop_runner::{ConversationLoop, TurnOutcome};
pub use runtime::{BuildError, assemble, build_chat_service};
