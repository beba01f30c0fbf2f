//! Add-link tool — puts a new button on the caller's artist link page.
//!
//! The artist platform sits behind [`LinkPages`]. The tool always edits the
//! first section of the link page of the caller's first artist profile.

use async_trait::async_trait;
use parley_config::ArtistConfig;
use parley_core::{Tool, TurnContext};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistProfile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPage {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub text: String,
    pub url: String,
    pub section_index: usize,
    /// Zero-based insert position; `None` appends.
    pub position: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AddedLink {
    pub link_id: String,
    /// Zero-based final position, when one was requested.
    pub position: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum AddLinkError {
    /// The platform refused the link; reported back to the model.
    #[error("{message}")]
    Rejected { code: String, message: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl AddLinkError {
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The artist platform's link page operations.
#[async_trait]
pub trait LinkPages: Send + Sync {
    async fn artists_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ArtistProfile>>;

    async fn link_page_for_artist(&self, artist_id: &str) -> anyhow::Result<Option<LinkPage>>;

    /// Validates, checks the user may edit the page, and saves.
    async fn add_link(
        &self,
        page: &LinkPage,
        link: NewLink,
        user_id: &str,
    ) -> Result<AddedLink, AddLinkError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredLink {
    pub id: String,
    pub text: String,
    pub url: String,
}

struct Artist {
    owner: String,
    profile: ArtistProfile,
    page: Option<LinkPage>,
}

/// Link pages held in memory, seeded from configured artists.
pub struct InMemoryLinkPages {
    artists: Vec<Artist>,
    // page id -> sections -> links
    pages: RwLock<HashMap<String, Vec<Vec<StoredLink>>>>,
}

impl InMemoryLinkPages {
    pub fn from_config(artists: &[ArtistConfig], link_page_base: &str) -> Self {
        let base = link_page_base.trim_end_matches('/');
        let artists: Vec<Artist> = artists
            .iter()
            .map(|a| Artist {
                owner: a.owner.clone(),
                profile: ArtistProfile {
                    id: a.slug.clone(),
                    name: a.name.clone(),
                },
                page: a.link_page.then(|| LinkPage {
                    id: format!("page-{}", a.slug),
                    url: format!("{base}/{}", a.slug),
                }),
            })
            .collect();

        let pages = artists
            .iter()
            .filter_map(|a| a.page.as_ref())
            .map(|p| (p.id.clone(), vec![Vec::new()]))
            .collect();

        Self {
            artists,
            pages: RwLock::new(pages),
        }
    }

    /// Links in one section of a page, for inspection.
    pub async fn links(&self, page_id: &str, section: usize) -> Vec<StoredLink> {
        self.pages
            .read()
            .await
            .get(page_id)
            .and_then(|sections| sections.get(section))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LinkPages for InMemoryLinkPages {
    async fn artists_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ArtistProfile>> {
        Ok(self
            .artists
            .iter()
            .filter(|a| a.owner == user_id)
            .map(|a| a.profile.clone())
            .collect())
    }

    async fn link_page_for_artist(&self, artist_id: &str) -> anyhow::Result<Option<LinkPage>> {
        Ok(self
            .artists
            .iter()
            .find(|a| a.profile.id == artist_id)
            .and_then(|a| a.page.clone()))
    }

    async fn add_link(
        &self,
        page: &LinkPage,
        link: NewLink,
        user_id: &str,
    ) -> Result<AddedLink, AddLinkError> {
        let may_edit = self
            .artists
            .iter()
            .any(|a| a.owner == user_id && a.page.as_ref().is_some_and(|p| p.id == page.id));
        if !may_edit {
            return Err(AddLinkError::rejected(
                "permission_denied",
                "You do not have permission to edit this link page.",
            ));
        }
        if link.text.trim().is_empty() {
            return Err(AddLinkError::rejected("invalid_text", "Link text is required."));
        }
        if !(link.url.starts_with("http://") || link.url.starts_with("https://")) {
            return Err(AddLinkError::rejected(
                "invalid_url",
                "Link URL must start with http:// or https://.",
            ));
        }

        let mut pages = self.pages.write().await;
        let sections = pages
            .get_mut(&page.id)
            .ok_or_else(|| anyhow::anyhow!("link page {} has no storage", page.id))?;
        if sections.len() <= link.section_index {
            sections.resize_with(link.section_index + 1, Vec::new);
        }
        let section = &mut sections[link.section_index];

        let link_id = format!("link_{}", uuid::Uuid::new_v4().simple());
        let stored = StoredLink {
            id: link_id.clone(),
            text: link.text.trim().to_string(),
            url: link.url,
        };
        let position = link.position.map(|p| p.min(section.len()));
        match position {
            Some(index) => section.insert(index, stored),
            None => section.push(stored),
        }

        info!(page = %page.id, link_id = %link_id, "Link added");
        Ok(AddedLink { link_id, position })
    }
}

pub struct AddLinkTool {
    pages: Option<Arc<dyn LinkPages>>,
}

impl AddLinkTool {
    pub const NAME: &'static str = "add_link_to_page";

    pub fn new(pages: Option<Arc<dyn LinkPages>>) -> Self {
        Self { pages }
    }
}

fn param_str<'a>(parameters: &'a Map<String, Value>, key: &str) -> &'a str {
    parameters.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[async_trait]
impl Tool for AddLinkTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Add a new link button to the user's artist link page. Use this when the user asks to add a link, button, or URL to their link page."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "link_text": {
                    "type": "string",
                    "description": "Text to display on the button (e.g., \"Pre-save my new single\", \"Listen on Spotify\", \"Buy tickets\")"
                },
                "link_url": {
                    "type": "string",
                    "description": "Full URL where the button should link to (must include http:// or https://)"
                },
                "position": {
                    "type": "integer",
                    "description": "Position in the list (1-based). Use 1 for first position. Omit to add the link to the end of the list."
                }
            },
            "required": ["link_text", "link_url"]
        })
    }

    async fn execute(&self, parameters: Map<String, Value>, ctx: &TurnContext) -> anyhow::Result<Value> {
        let Some(user) = ctx.user() else {
            return Ok(json!({ "error": "You must be logged in to edit a link page." }));
        };
        let Some(pages) = &self.pages else {
            return Ok(json!({ "error": "The artist platform is not available." }));
        };

        let artists = pages.artists_for_user(&user.id).await?;
        let Some(artist) = artists.first() else {
            return Ok(json!({
                "error": "You don't have any artist profiles yet.",
                "suggestion": "Create an artist profile on the artist platform to get started with your link page.",
            }));
        };

        let Some(page) = pages.link_page_for_artist(&artist.id).await? else {
            return Ok(json!({
                "error": "No link page found for your artist profile.",
                "suggestion": "Link pages are created automatically when you set up your artist profile.",
            }));
        };

        let text = param_str(&parameters, "link_text");
        let link = NewLink {
            text: text.to_string(),
            url: param_str(&parameters, "link_url").trim().to_string(),
            section_index: 0,
            position: parameters
                .get("position")
                .and_then(Value::as_i64)
                .map(|p| p.saturating_sub(1).max(0) as usize),
        };

        match pages.add_link(&page, link, &user.id).await {
            Ok(added) => {
                let position_text = added
                    .position
                    .map(|p| format!(" at position {}", p + 1))
                    .unwrap_or_default();
                Ok(json!({
                    "success": true,
                    "message": format!(
                        "Added \"{text}\" to {}'s link page{position_text}. View it here: {}",
                        artist.name, page.url
                    ),
                    "link_page_url": page.url,
                    "link_id": added.link_id,
                    "position": added.position.map(|p| p + 1),
                }))
            }
            Err(AddLinkError::Rejected { code, message }) => Ok(json!({
                "error": message,
                "error_code": code,
            })),
            Err(AddLinkError::Backend(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::UserProfile;

    fn platform() -> Arc<InMemoryLinkPages> {
        Arc::new(InMemoryLinkPages::from_config(
            &[
                ArtistConfig {
                    owner: "42".into(),
                    name: "The Rivertones".into(),
                    slug: "rivertones".into(),
                    link_page: true,
                },
                ArtistConfig {
                    owner: "7".into(),
                    name: "Quiet Hours".into(),
                    slug: "quiet-hours".into(),
                    link_page: false,
                },
            ],
            "https://extrachill.link/",
        ))
    }

    fn ctx(id: &str) -> TurnContext {
        TurnContext::for_user(UserProfile::new(id, "Someone"))
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn adds_link_to_end_and_at_position() {
        let pages = platform();
        let tool = AddLinkTool::new(Some(pages.clone()));

        let out = tool
            .execute(
                params(json!({"link_text": "Listen on Spotify", "link_url": "https://open.spotify.com/x"})),
                &ctx("42"),
            )
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(
            out["message"],
            "Added \"Listen on Spotify\" to The Rivertones's link page. View it here: https://extrachill.link/rivertones"
        );
        assert!(out["position"].is_null());

        let out = tool
            .execute(
                params(json!({"link_text": "Buy tickets", "link_url": "https://tix.example/1", "position": 1})),
                &ctx("42"),
            )
            .await
            .unwrap();
        assert_eq!(out["position"], 1);
        assert!(out["message"].as_str().unwrap().contains("at position 1"));

        let links = pages.links("page-rivertones", 0).await;
        let texts: Vec<_> = links.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Buy tickets", "Listen on Spotify"]);
    }

    #[tokio::test]
    async fn user_without_artists_gets_suggestion() {
        let tool = AddLinkTool::new(Some(platform()));
        let out = tool
            .execute(
                params(json!({"link_text": "x", "link_url": "https://x.test"})),
                &ctx("99"),
            )
            .await
            .unwrap();
        assert_eq!(out["error"], "You don't have any artist profiles yet.");
        assert!(out["suggestion"].is_string());
    }

    #[tokio::test]
    async fn artist_without_page_gets_suggestion() {
        let tool = AddLinkTool::new(Some(platform()));
        let out = tool
            .execute(
                params(json!({"link_text": "x", "link_url": "https://x.test"})),
                &ctx("7"),
            )
            .await
            .unwrap();
        assert_eq!(out["error"], "No link page found for your artist profile.");
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_with_code() {
        let tool = AddLinkTool::new(Some(platform()));
        let out = tool
            .execute(
                params(json!({"link_text": "Home", "link_url": "ftp://files.test"})),
                &ctx("42"),
            )
            .await
            .unwrap();
        assert_eq!(out["error_code"], "invalid_url");
    }

    #[tokio::test]
    async fn anonymous_and_missing_platform_are_reported() {
        let tool = AddLinkTool::new(Some(platform()));
        let out = tool
            .execute(params(json!({"link_text": "x", "link_url": "https://x.test"})), &TurnContext::new())
            .await
            .unwrap();
        assert!(out["error"].as_str().unwrap().contains("logged in"));

        let tool = AddLinkTool::new(None);
        let out = tool
            .execute(params(json!({"link_text": "x", "link_url": "https://x.test"})), &ctx("42"))
            .await
            .unwrap();
        assert!(out["error"].as_str().unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn other_users_page_is_refused() {
        let pages = platform();
        let page = pages.link_page_for_artist("rivertones").await.unwrap().unwrap();
        let err = pages
            .add_link(
                &page,
                NewLink {
                    text: "x".into(),
                    url: "https://x.test".into(),
                    section_index: 0,
                    position: None,
                },
                "7",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AddLinkError::Rejected { code, .. } if code == "permission_denied"));
    }
}
