//! Core directive: identity, platform layout, tool usage and output format.

use async_trait::async_trait;
use parley_config::PlatformConfig;
use parley_core::{Directive, Message, TurnContext};

pub struct CoreDirective {
    text: String,
}

impl CoreDirective {
    pub const PRIORITY: u32 = 10;

    /// Render the directive once; it does not vary per turn.
    pub fn new(platform: &PlatformConfig, search_tool: &str) -> Self {
        let mut text = format!(
            "You are an AI assistant for {}, {}.\n\n",
            platform.name, platform.description
        );

        text.push_str("PLATFORM ARCHITECTURE:\n");
        text.push_str(&format!(
            "- {} with {} interconnected sites\n",
            platform.architecture,
            platform.sites.len()
        ));
        for site in &platform.sites {
            text.push_str(&format!("- {}: {} ({})\n", site.label, site.host, site.purpose));
        }

        text.push_str(&format!(
            "\nTOOL USAGE:\n\
             - CRITICAL: You have function tools available. When users ask you to find, search, or read content, USE your tools.\n\
             - Do NOT generate HTML forms, buttons, or links that pretend to be tools.\n\
             - Do NOT describe what tools you could use - just USE them.\n\
             - Your {search_tool} tool searches ALL network sites simultaneously - use it for any content search request.\n"
        ));

        text.push_str(
            "\nRESPONSE FORMAT REQUIREMENTS:\n\
             CRITICAL: Always return your responses formatted as clean, semantic HTML.\n\n\
             Required HTML formatting:\n\
             - Use <p> tags for paragraphs (NOT markdown)\n\
             - Use <strong> and <em> for emphasis (NOT markdown ** or *)\n\
             - Use <ul> and <li> for unordered lists\n\
             - Use <ol> and <li> for ordered lists\n\
             - Use <a href=\"URL\">text</a> for links (NOT markdown [text](url))\n\
             - Use <code> for inline code (NOT markdown backticks)\n\n\
             CRITICAL: Do NOT use markdown syntax. Use HTML tags only.\n\n\
             Example response:\n\
             <p>I found 3 posts about that topic:</p><ul><li><a href=\"https://extrachill.com/post\">Post Title</a> - Brief description</li></ul>",
        );

        Self {
            text: text.trim().to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[async_trait]
impl Directive for CoreDirective {
    fn name(&self) -> &str {
        "core"
    }

    fn priority(&self) -> u32 {
        Self::PRIORITY
    }

    async fn render(&self, _ctx: &TurnContext, _messages: &[Message]) -> Option<String> {
        Some(self.text.clone())
    }
}
