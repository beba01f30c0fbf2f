//! Built-in tools for Parley.
//!
//! - `search_network`: full-text search across the platform's sites
//! - `add_link_to_page`: add a button to the caller's artist link page
//!
//! Both are contributed through [`BuiltinTools`], the "builtin" tool source.

pub mod add_link;
pub mod search;

use parley_config::AppConfig;
use parley_core::tool::{ToolDefinition, ToolRegistry, ToolSource};
use std::sync::Arc;
use tracing::warn;

pub use add_link::{AddLinkTool, InMemoryLinkPages, LinkPages};
pub use search::{InMemorySearchIndex, SearchIndex, SearchNetworkTool};

/// The "builtin" tool source.
#[derive(Clone, Default)]
pub struct BuiltinTools {
    search: Option<Arc<dyn SearchIndex>>,
    hosts: Vec<String>,
    link_pages: Option<Arc<dyn LinkPages>>,
}

impl BuiltinTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, index: Arc<dyn SearchIndex>, hosts: Vec<String>) -> Self {
        self.search = Some(index);
        self.hosts = hosts;
        self
    }

    pub fn with_link_pages(mut self, pages: Arc<dyn LinkPages>) -> Self {
        self.link_pages = Some(pages);
        self
    }

    /// Wire the backends described by the config.
    ///
    /// A search index that fails to load is logged and left out; the search
    /// tool then reports itself unavailable.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut tools = Self::new();
        tools.hosts = config.platform.sites.iter().map(|s| s.host.clone()).collect();

        if let Some(path) = &config.tools.search_index {
            match InMemorySearchIndex::load(path) {
                Ok(index) => tools.search = Some(Arc::new(index)),
                Err(e) => warn!(path = %path.display(), error = %e, "Search index not loaded"),
            }
        }

        if let Some(artists) = &config.affiliations.artists {
            tools.link_pages = Some(Arc::new(InMemoryLinkPages::from_config(
                artists,
                &config.platform.link_page_base,
            )));
        }
        tools
    }
}

impl ToolSource for BuiltinTools {
    fn name(&self) -> &str {
        "builtin"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::from_tool(Arc::new(SearchNetworkTool::new(
                self.search.clone(),
                &self.hosts,
            ))),
            ToolDefinition::from_tool(Arc::new(AddLinkTool::new(self.link_pages.clone()))),
        ]
    }
}

/// Build the registry for a config: builtin tools minus `tools.disabled`.
pub fn registry_from_config(config: &AppConfig) -> ToolRegistry {
    config
        .tools
        .disabled
        .iter()
        .fold(
            ToolRegistry::builder().source(BuiltinTools::from_config(config)),
            |builder, id| builder.exclude(id.clone()),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_builtin_tools_in_order() {
        let registry = registry_from_config(&AppConfig::default());
        assert_eq!(registry.ids(), vec![SearchNetworkTool::NAME, AddLinkTool::NAME]);
    }

    #[test]
    fn disabled_tools_are_left_out() {
        let mut config = AppConfig::default();
        config.tools.disabled = vec![AddLinkTool::NAME.into()];
        let registry = registry_from_config(&config);
        assert_eq!(registry.ids(), vec![SearchNetworkTool::NAME]);
    }

    #[test]
    fn missing_index_file_still_builds() {
        let mut config = AppConfig::default();
        config.tools.search_index = Some("/nonexistent/index.json".into());
        let registry = registry_from_config(&config);
        assert!(registry.has(SearchNetworkTool::NAME));
    }

    #[tokio::test]
    async fn search_reports_unavailable_without_index() {
        let registry = registry_from_config(&AppConfig::default());
        let out = registry
            .call(
                SearchNetworkTool::NAME,
                serde_json::json!({"query": "jazz"}).as_object().cloned().unwrap(),
                &parley_core::TurnContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(out["success"], false);
    }
}
