//! Network context directive — only registered when a provider exists.

use async_trait::async_trait;
use parley_core::{Directive, Message, TurnContext};
use std::sync::Arc;

/// Supplies site-network context text for a turn.
#[async_trait]
pub trait NetworkContextProvider: Send + Sync {
    async fn network_context(&self, ctx: &TurnContext) -> Option<String>;
}

/// Fixed text from configuration.
pub struct StaticNetworkContext(pub String);

#[async_trait]
impl NetworkContextProvider for StaticNetworkContext {
    async fn network_context(&self, _ctx: &TurnContext) -> Option<String> {
        Some(self.0.clone())
    }
}

pub struct NetworkContextDirective {
    provider: Arc<dyn NetworkContextProvider>,
}

impl NetworkContextDirective {
    pub const PRIORITY: u32 = 40;

    pub fn new(provider: Arc<dyn NetworkContextProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Directive for NetworkContextDirective {
    fn name(&self) -> &str {
        "network_context"
    }

    fn priority(&self) -> u32 {
        Self::PRIORITY
    }

    async fn render(&self, ctx: &TurnContext, _messages: &[Message]) -> Option<String> {
        self.provider.network_context(ctx).await
    }
}
