//! The bounded tool-calling conversation loop.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::validate_sequence;
use parley_core::{
    DirectivePipeline, Error, Message, Provider, ProviderRequest, ToolCallRecord, ToolRegistry,
    TurnContext,
};
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// The result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final assistant text
    pub content: String,

    /// Every tool call the model requested, in order
    pub tool_calls: Vec<ToolCallRecord>,

    /// Input messages followed by everything the turn added
    pub messages: Vec<Message>,

    /// Model calls made
    pub iterations: u32,
}

/// Drives one turn: model call, tool execution, repeat until plain text.
pub struct ConversationLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    directives: DirectivePipeline,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
}

impl ConversationLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        directives: DirectivePipeline,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools,
            directives,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus,
        }
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run a turn over `messages`.
    ///
    /// Directives are applied to each outgoing request only; the returned
    /// transcript holds the input plus tool requests, tool results and the
    /// final assistant message.
    pub async fn run(&self, messages: Vec<Message>, ctx: &TurnContext) -> Result<TurnOutcome, Error> {
        if messages.is_empty() {
            return Err(Error::InvalidMessages("no messages to send".into()));
        }
        validate_sequence(&messages).map_err(|e| Error::InvalidMessages(e.to_string()))?;

        let conversation_id = ctx
            .conversation_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let tool_specs = self.tools.for_model();
        let mut transcript = messages;
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut tokens_used = 0u32;

        for iteration in 1..=self.max_iterations {
            debug!(
                conversation_id = %conversation_id,
                iteration,
                messages = transcript.len(),
                "Conversation loop iteration"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: self.directives.apply(ctx, &transcript).await,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_specs.clone(),
            };

            let reply = self.provider.complete(request).await.map_err(|e| {
                error!(
                    conversation_id = %conversation_id,
                    provider = self.provider.name(),
                    error = %e,
                    "Model request failed"
                );
                Error::ModelRequestFailed(e)
            })?;

            if let Some(usage) = &reply.usage {
                tokens_used = tokens_used.saturating_add(usage.total_tokens);
            }

            if reply.tool_calls.is_empty() {
                let content = reply.text_content().ok_or(Error::InvalidResponse)?.to_string();
                transcript.push(Message::assistant(content.clone()));

                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation_id.clone(),
                    model: reply.model.clone(),
                    iterations: iteration,
                    tokens_used,
                    timestamp: Utc::now(),
                });
                info!(
                    conversation_id = %conversation_id,
                    iterations = iteration,
                    tool_calls = tool_calls.len(),
                    "Turn complete"
                );

                return Ok(TurnOutcome {
                    content,
                    tool_calls,
                    messages: transcript,
                    iterations: iteration,
                });
            }

            transcript.push(Message::tool_request(reply.tool_calls.clone()));

            for call in &reply.tool_calls {
                info!(
                    conversation_id = %conversation_id,
                    tool = %call.name,
                    call_id = %call.id,
                    "Executing tool"
                );
                tool_calls.push(call.record());

                let start = Instant::now();
                let result = self.tools.call(&call.name, call.parameters.clone(), ctx).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: call.name.clone(),
                    success: result.is_ok(),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                let output = result.map_err(|e| {
                    warn!(tool = %call.name, error = %e, "Tool call failed; aborting turn");
                    Error::Tool(e)
                })?;
                transcript.push(Message::tool_result(&call.id, serde_json::to_string(&output)?));
            }
        }

        warn!(
            conversation_id = %conversation_id,
            max_iterations = self.max_iterations,
            "Conversation loop hit its iteration cap; model kept requesting tools"
        );
        Err(Error::MaxIterationsReached(self.max_iterations))
    }
}
