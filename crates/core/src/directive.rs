//! System directives and the ordered pipeline that injects them.
//!
//! Before every model call the pipeline asks each directive, lowest priority
//! first, for a piece of system text and appends it as a system message after
//! the conversation. Directives never touch the stored transcript.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::TurnContext;
use crate::message::Message;

#[async_trait]
pub trait Directive: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> u32;

    /// System text to inject, or `None` to stay silent this call.
    async fn render(&self, ctx: &TurnContext, messages: &[Message]) -> Option<String>;
}

/// Directives sorted by priority; equal priorities keep registration order.
#[derive(Default, Clone)]
pub struct DirectivePipeline {
    directives: Vec<Arc<dyn Directive>>,
}

impl DirectivePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, directive: Arc<dyn Directive>) -> Self {
        self.register(directive);
        self
    }

    pub fn register(&mut self, directive: Arc<dyn Directive>) {
        self.directives.push(directive);
        self.directives.sort_by_key(|d| d.priority());
    }

    /// Return `messages` followed by one system message per directive that
    /// rendered non-blank text.
    pub async fn apply(&self, ctx: &TurnContext, messages: &[Message]) -> Vec<Message> {
        let mut out = messages.to_vec();
        for directive in &self.directives {
            match directive.render(ctx, &out).await {
                Some(text) if !text.trim().is_empty() => {
                    tracing::trace!(directive = directive.name(), "Directive applied");
                    out.push(Message::system(text));
                }
                _ => {}
            }
        }
        out
    }

    pub fn names(&self) -> Vec<&str> {
        self.directives.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}
