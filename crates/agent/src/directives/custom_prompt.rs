use async_trait::async_trait;
use parley_core::{Directive, Message, TurnContext};

/// Operator-configured prompt text, injected after the core directive.
pub struct CustomPromptDirective {
    prompt: String,
}

impl CustomPromptDirective {
    pub const PRIORITY: u32 = 20;

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl Directive for CustomPromptDirective {
    fn name(&self) -> &str {
        "custom_prompt"
    }

    fn priority(&self) -> u32 {
        Self::PRIORITY
    }

    async fn render(&self, _ctx: &TurnContext, _messages: &[Message]) -> Option<String> {
        let prompt = self.prompt.trim();
        (!prompt.is_empty()).then(|| prompt.to_string())
    }
}
