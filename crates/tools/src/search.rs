//! Network search tool — finds content across every site of the platform.
//!
//! Ranking lives behind [`SearchIndex`]; the tool validates parameters and
//! shapes hits into the result object the model reads.

use anyhow::Context;
use async_trait::async_trait;
use parley_core::{Tool, TurnContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// A searchable document as published on one of the network's sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    pub url: String,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default)]
    pub date: String,
    pub site_name: String,
    /// Site base URL, e.g. `https://community.extrachill.com`
    pub site_url: String,
    #[serde(default)]
    pub author: String,
}

fn default_post_type() -> String {
    "post".into()
}

/// One formatted hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub excerpt: String,
    pub url: String,
    pub post_type: String,
    pub date: String,
    pub site_name: String,
    pub site_url: String,
    pub author: String,
}

impl From<&Document> for SearchHit {
    fn from(doc: &Document) -> Self {
        Self {
            title: doc.title.clone(),
            excerpt: doc.excerpt.clone(),
            url: doc.url.clone(),
            post_type: doc.post_type.clone(),
            date: doc.date.clone(),
            site_name: doc.site_name.clone(),
            site_url: doc.site_url.clone(),
            author: doc.author.clone(),
        }
    }
}

/// Total match count plus the first `limit` hits.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// `sites` holds host names; empty means every site.
    async fn search(&self, query: &str, sites: &[String], limit: usize) -> anyhow::Result<SearchPage>;
}

/// Weighted keyword search over documents held in memory.
///
/// Exact title matches rank above partial title matches, which rank above
/// excerpt and body matches. Ties go to the newer document.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: Vec<Document>,
}

impl InMemorySearchIndex {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Load a JSON array of documents.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading search index {}", path.display()))?;
        let documents: Vec<Document> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing search index {}", path.display()))?;
        debug!(documents = documents.len(), path = %path.display(), "Search index loaded");
        Ok(Self::new(documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn score(doc: &Document, phrase: &str, terms: &[&str]) -> u32 {
        let title = doc.title.to_lowercase();
        let excerpt = doc.excerpt.to_lowercase();
        let content = doc.content.to_lowercase();

        let mut score = 0;
        if title == phrase {
            score += 100;
        } else if title.contains(phrase) {
            score += 50;
        }
        for term in terms {
            if title.contains(term) {
                score += 10;
            }
            if excerpt.contains(term) {
                score += 4;
            }
            if content.contains(term) {
                score += 2;
            }
        }
        score
    }
}

fn host_of(url: &str) -> &str {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn search(&self, query: &str, sites: &[String], limit: usize) -> anyhow::Result<SearchPage> {
        let phrase = query.trim().to_lowercase();
        let terms: Vec<&str> = phrase.split_whitespace().collect();

        let mut scored: Vec<(u32, &Document)> = self
            .documents
            .iter()
            .filter(|doc| {
                sites.is_empty()
                    || sites
                        .iter()
                        .any(|s| host_of(s).eq_ignore_ascii_case(host_of(&doc.site_url)))
            })
            .map(|doc| (Self::score(doc, &phrase, &terms), doc))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.date.cmp(&a.1.date)));

        Ok(SearchPage {
            total: scored.len(),
            hits: scored
                .into_iter()
                .take(limit)
                .map(|(_, doc)| SearchHit::from(doc))
                .collect(),
        })
    }
}

pub struct SearchNetworkTool {
    index: Option<Arc<dyn SearchIndex>>,
    description: String,
}

impl SearchNetworkTool {
    pub const NAME: &'static str = "search_network";

    /// `hosts` is listed in the description so the model knows what exists.
    pub fn new(index: Option<Arc<dyn SearchIndex>>, hosts: &[String]) -> Self {
        let scope = if hosts.is_empty() {
            "all network sites".to_string()
        } else {
            hosts.join(", ")
        };
        Self {
            index,
            description: format!(
                "Search across all network sites ({scope}). Returns highly relevant results with \
                 weighted scoring that prioritizes exact matches. Use this to find posts, pages, \
                 forum topics, products, and other content across the entire network."
            ),
        }
    }
}

fn failure(error: &str) -> Value {
    json!({ "success": false, "error": error })
}

#[async_trait]
impl Tool for SearchNetworkTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query to find content across the network"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 10, max: 50)"
                },
                "sites": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional: specific sites to search, as domains, e.g. [\"community.extrachill.com\"]. If omitted, searches all sites."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, parameters: Map<String, Value>, _ctx: &TurnContext) -> anyhow::Result<Value> {
        let Some(index) = &self.index else {
            return Ok(failure(
                "Search functionality is not available. No search index is configured.",
            ));
        };

        let query = parameters
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if query.is_empty() {
            return Ok(failure("Search query is required"));
        }

        let limit = parameters
            .get("limit")
            .and_then(Value::as_u64)
            .filter(|l| *l > 0)
            .map_or(DEFAULT_LIMIT, |l| (l as usize).min(MAX_LIMIT));

        let sites: Vec<String> = parameters
            .get("sites")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let page = index.search(query, &sites, limit).await?;
        debug!(query, total = page.total, returned = page.hits.len(), "Network search");

        if page.hits.is_empty() {
            return Ok(json!({
                "success": true,
                "query": query,
                "total_results": 0,
                "results_returned": 0,
                "message": format!("No results found for \"{query}\""),
                "results": [],
            }));
        }

        Ok(json!({
            "success": true,
            "query": query,
            "total_results": page.total,
            "results_returned": page.hits.len(),
            "sites_searched": if sites.is_empty() { "all network sites".to_string() } else { sites.join(", ") },
            "results": page.hits,
        }))
    }
}
