//! Wiring a [`ChatService`] from configuration.

use std::sync::Arc;

use parley_config::AppConfig;
use parley_core::error::{ProviderError, StoreError};
use parley_core::{EventBus, MessageStore, Provider};
use tracing::info;

use crate::chat::ChatService;
use crate::directives::pipeline_from_config;
use crate::loop_runner::ConversationLoop;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Model provider unavailable: {0}")]
    Provider(#[from] ProviderError),

    #[error("Message store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Build the provider and store named by `config`, then the service.
pub async fn build_chat_service(config: &AppConfig) -> Result<ChatService, BuildError> {
    let provider = parley_providers::build_from_config(config)?;
    let store = parley_store::build_from_config(config).await?;
    Ok(assemble(config, provider, store))
}

/// Build the service around an explicit provider and store.
pub fn assemble(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    store: Arc<dyn MessageStore>,
) -> ChatService {
    let event_bus = Arc::new(EventBus::default());
    let tools = Arc::new(parley_tools::registry_from_config(config));
    let directives = pipeline_from_config(config);

    info!(
        provider = provider.name(),
        model = %config.model,
        store = store.name(),
        tools = tools.len(),
        directives = directives.len(),
        "Chat service ready"
    );

    let runner = ConversationLoop::new(provider, config.model.clone(), tools, directives, event_bus.clone())
        .with_max_iterations(config.chat.max_iterations)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    ChatService::new(runner, store, event_bus).with_history_window(config.chat.history_window)
}
