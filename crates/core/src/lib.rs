//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley chat
//! orchestrator. This crate has **no framework dependencies**: it defines the
//! model every other crate implements against.
//!
//! ## Layout
//!
//! - [`message`]: the role-keyed message sum type and tool call records
//! - [`tool`]: tool trait, tool sources and the immutable [`ToolRegistry`]
//! - [`directive`]: system directives and the ordered [`DirectivePipeline`]
//! - [`provider`]: the model client seam
//! - [`store`]: conversation persistence seam
//! - [`event`]: domain events on a broadcast bus

pub mod context;
pub mod directive;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;
pub mod user;

// Re-export key types at crate root for ergonomics
pub use context::TurnContext;
pub use directive::{Directive, DirectivePipeline};
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationId, Message, Role, ToolCall, ToolCallRecord};
pub use provider::{ModelReply, Provider, ProviderRequest, Usage};
pub use store::MessageStore;
pub use tool::{
    FunctionSpec, StaticToolSource, Tool, ToolDefinition, ToolRegistry, ToolRegistryBuilder,
    ToolSource,
};
pub use user::UserProfile;
