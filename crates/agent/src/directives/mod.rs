//! Built-in directives.
//!
//! | priority | directive        | active when                       |
//! |----------|------------------|-----------------------------------|
//! | 10       | core             | always                            |
//! | 20       | custom_prompt    | `chat.system_prompt` is not blank |
//! | 30       | user_context     | the turn has a user               |
//! | 40       | network_context  | a network provider is configured  |

pub mod custom_prompt;
pub mod network;
pub mod platform;
pub mod user_context;

pub use custom_prompt::CustomPromptDirective;
pub use network::{NetworkContextDirective, NetworkContextProvider, StaticNetworkContext};
pub use platform::CoreDirective;
pub use user_context::{
    AffiliationSource, ArtistRoster, CommunityRoster, TeamRoster, UserContextDirective,
};

use parley_config::AppConfig;
use parley_core::DirectivePipeline;
use parley_tools::SearchNetworkTool;
use std::sync::Arc;

/// The standard pipeline for a config.
pub fn pipeline_from_config(config: &AppConfig) -> DirectivePipeline {
    let mut pipeline = DirectivePipeline::new()
        .with(Arc::new(CoreDirective::new(&config.platform, SearchNetworkTool::NAME)))
        .with(Arc::new(CustomPromptDirective::new(config.chat.system_prompt.clone())))
        .with(Arc::new(UserContextDirective::from_config(&config.affiliations)));

    if let Some(text) = &config.platform.network_context {
        pipeline.register(Arc::new(NetworkContextDirective::new(Arc::new(
            StaticNetworkContext(text.clone()),
        ))));
    }
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{Message, Role, TurnContext, UserProfile};

    #[test]
    fn network_directive_only_with_context() {
        let mut config = AppConfig::default();
        assert_eq!(
            pipeline_from_config(&config).names(),
            vec!["core", "custom_prompt", "user_context"]
        );

        config.platform.network_context = Some("Shows tonight: none".into());
        assert_eq!(
            pipeline_from_config(&config).names(),
            vec!["core", "custom_prompt", "user_context", "network_context"]
        );
    }

    #[tokio::test]
    async fn applies_after_history_and_is_repeatable() {
        let mut config = AppConfig::default();
        config.chat.system_prompt = "Be brief.".into();
        let pipeline = pipeline_from_config(&config);
        let ctx = TurnContext::for_user(UserProfile::new("1", "Jo").with_handle("jo"));
        let history = vec![Message::user("hi")];

        let first = pipeline.apply(&ctx, &history).await;
        let second = pipeline.apply(&ctx, &history).await;
        assert_eq!(first.len(), 4);
        assert_eq!(first[0], history[0]);
        assert!(first[1..].iter().all(|m| m.role() == Role::System));
        assert_eq!(first[2].content(), Some("Be brief."));
        let contents = |ms: &[Message]| ms.iter().map(|m| m.content().map(str::to_string)).collect::<Vec<_>>();
        assert_eq!(contents(&first), contents(&second));
    }
}
