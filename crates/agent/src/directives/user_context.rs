//! User context directive — who the caller is on the platform.
//!
//! Identity lines come from the [`UserProfile`]. Membership facts come from
//! optional [`AffiliationSource`]s; a deployment without a given source simply
//! omits that line.

use async_trait::async_trait;
use parley_config::AffiliationsConfig;
use parley_core::{Directive, Message, TurnContext, UserProfile};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One membership fact about a user, rendered as `- {label}: {value}`.
#[async_trait]
pub trait AffiliationSource: Send + Sync {
    fn label(&self) -> &str;

    /// `None` omits the line for this user.
    async fn describe(&self, user: &UserProfile) -> Option<String>;
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

/// Team membership from a fixed list of user ids.
pub struct TeamRoster {
    members: HashSet<String>,
}

impl TeamRoster {
    pub fn new(members: impl IntoIterator<Item = String>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AffiliationSource for TeamRoster {
    fn label(&self) -> &str {
        "Team Member"
    }

    async fn describe(&self, user: &UserProfile) -> Option<String> {
        Some(yes_no(self.members.contains(&user.id)))
    }
}

/// Community accounts from a fixed list of user ids.
pub struct CommunityRoster {
    members: HashSet<String>,
}

impl CommunityRoster {
    pub fn new(members: impl IntoIterator<Item = String>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AffiliationSource for CommunityRoster {
    fn label(&self) -> &str {
        "Community Member"
    }

    async fn describe(&self, user: &UserProfile) -> Option<String> {
        Some(yes_no(self.members.contains(&user.id)))
    }
}

/// Artist profile counts per owning user.
pub struct ArtistRoster {
    profiles: HashMap<String, usize>,
}

impl ArtistRoster {
    pub fn new<'a>(owners: impl IntoIterator<Item = &'a str>) -> Self {
        let mut profiles = HashMap::new();
        for owner in owners {
            *profiles.entry(owner.to_string()).or_insert(0) += 1;
        }
        Self { profiles }
    }
}

#[async_trait]
impl AffiliationSource for ArtistRoster {
    fn label(&self) -> &str {
        "Artist"
    }

    async fn describe(&self, user: &UserProfile) -> Option<String> {
        Some(match self.profiles.get(&user.id).copied().unwrap_or(0) {
            0 => "No".to_string(),
            1 => "Yes (1 profile)".to_string(),
            n => format!("Yes ({n} profiles)"),
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Default)]
pub struct UserContextDirective {
    sources: Vec<Arc<dyn AffiliationSource>>,
}

impl UserContextDirective {
    pub const PRIORITY: u32 = 30;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn AffiliationSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Team, artist and community sources for whichever sections are set.
    pub fn from_config(affiliations: &AffiliationsConfig) -> Self {
        let mut directive = Self::new();
        if let Some(team) = &affiliations.team {
            directive = directive.with_source(Arc::new(TeamRoster::new(team.iter().cloned())));
        }
        if let Some(artists) = &affiliations.artists {
            directive = directive
                .with_source(Arc::new(ArtistRoster::new(artists.iter().map(|a| a.owner.as_str()))));
        }
        if let Some(community) = &affiliations.community {
            directive =
                directive.with_source(Arc::new(CommunityRoster::new(community.iter().cloned())));
        }
        directive
    }
}

#[async_trait]
impl Directive for UserContextDirective {
    fn name(&self) -> &str {
        "user_context"
    }

    fn priority(&self) -> u32 {
        Self::PRIORITY
    }

    async fn render(&self, ctx: &TurnContext, _messages: &[Message]) -> Option<String> {
        let user = ctx.user()?;

        let mut lines = vec![
            "USER CONTEXT:".to_string(),
            format!("- Display Name: {}", user.display_name),
            format!("- Username: @{}", user.handle),
        ];
        if let Some(role) = user.current_role() {
            lines.push(format!("- Current Site Role: {}", capitalize(role)));
        }
        for source in &self.sources {
            if let Some(value) = source.describe(user).await {
                lines.push(format!("- {}: {}", source.label(), value));
            }
        }
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::ArtistConfig;

    fn artist(owner: &str, slug: &str) -> ArtistConfig {
        ArtistConfig {
            owner: owner.into(),
            name: slug.into(),
            slug: slug.into(),
            link_page: true,
        }
    }

    fn sam() -> UserProfile {
        UserProfile::new("42", "Sam Rivera")
            .with_handle("samr")
            .with_role("editor")
    }

    #[tokio::test]
    async fn silent_without_user() {
        let directive = UserContextDirective::new();
        assert!(directive.render(&TurnContext::new(), &[]).await.is_none());
    }

    #[tokio::test]
    async fn identity_only_without_sources() {
        let text = UserContextDirective::new()
            .render(&TurnContext::for_user(sam()), &[])
            .await
            .unwrap();
        assert_eq!(
            text,
            "USER CONTEXT:\n- Display Name: Sam Rivera\n- Username: @samr\n- Current Site Role: Editor"
        );
    }

    #[tokio::test]
    async fn affiliation_facts_from_config() {
        let affiliations = AffiliationsConfig {
            team: Some(vec!["42".into()]),
            community: Some(vec![]),
            artists: Some(vec![artist("42", "a"), artist("42", "b"), artist("7", "c")]),
        };
        let directive = UserContextDirective::from_config(&affiliations);

        let text = directive
            .render(&TurnContext::for_user(sam()), &[])
            .await
            .unwrap();
        assert!(text.ends_with(
            "- Team Member: Yes\n- Artist: Yes (2 profiles)\n- Community Member: No"
        ));

        let other = UserProfile::new("7", "Robin").with_handle("robin");
        let text = directive
            .render(&TurnContext::for_user(other), &[])
            .await
            .unwrap();
        assert!(!text.contains("Current Site Role"));
        assert!(text.contains("- Artist: Yes (1 profile)"));
    }

    #[tokio::test]
    async fn absent_sections_are_omitted() {
        let affiliations = AffiliationsConfig {
            team: None,
            community: None,
            artists: Some(vec![]),
        };
        let text = UserContextDirective::from_config(&affiliations)
            .render(&TurnContext::for_user(sam()), &[])
            .await
            .unwrap();
        assert!(text.contains("- Artist: No"));
        assert!(!text.contains("Team Member"));
        assert!(!text.contains("Community Member"));
    }
}
