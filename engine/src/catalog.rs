//! Read-side queries for browsing
//!
//! Home listing, author dashboard and plugin detail. Detail goes through the
//! moderation engine so the visibility rule is applied on every fetch.
//! Author identity is attached after the fetch; there is no join.

use sdk::errors::MarketError;
use sdk::types::{PluginStatus, Principal};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::{fault, Plugin, PluginRepository, User, UserRepository};
use crate::moderation::{ModerationEngine, Policy};
use crate::render::render_markdown;

/// Number of plugins on the home page
pub const HOME_LIMIT: i64 = 12;

/// Display identity of a plugin's author
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorInfo {
    pub email: String,
    pub name: Option<String>,
}

impl From<User> for AuthorInfo {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

/// A plugin with its author attached
#[derive(Debug, Clone, Serialize)]
pub struct ListedPlugin {
    #[serde(flatten)]
    pub plugin: Plugin,
    pub author: Option<AuthorInfo>,
}

/// Everything the detail page shows
#[derive(Debug, Clone, Serialize)]
pub struct PluginDetail {
    #[serde(flatten)]
    pub plugin: Plugin,
    pub author: Option<AuthorInfo>,
    pub html_description: String,
    pub html_changelog: String,
}

#[derive(Clone)]
pub struct Catalog {
    plugins: PluginRepository,
    users: UserRepository,
    moderation: ModerationEngine,
}

impl Catalog {
    pub fn new(plugins: PluginRepository, users: UserRepository, moderation: ModerationEngine) -> Self {
        Self {
            plugins,
            users,
            moderation,
        }
    }

    /// Newest approved plugins
    pub async fn recent(&self) -> Result<Vec<ListedPlugin>, MarketError> {
        let plugins = self
            .plugins
            .list_recent(PluginStatus::Approved, HOME_LIMIT)
            .await
            .map_err(fault)?;

        let mut authors: HashMap<i64, Option<AuthorInfo>> = HashMap::new();
        let mut listed = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            if !authors.contains_key(&plugin.author_id) {
                let author = self.author(plugin.author_id).await?;
                authors.insert(plugin.author_id, author);
            }
            let author = authors.get(&plugin.author_id).cloned().flatten();
            listed.push(ListedPlugin { plugin, author });
        }
        Ok(listed)
    }

    /// The viewer's own plugins in any status, newest first
    pub async fn dashboard(&self, viewer: Option<&Principal>) -> Result<Vec<Plugin>, MarketError> {
        let viewer = Policy::require_authenticated(viewer)?;
        self.plugins
            .list_by_author(viewer.id)
            .await
            .map_err(fault)
    }

    /// Plugin detail with rendered markdown
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `NotAvailable` when the viewer may not
    /// see this plugin in its current status.
    pub async fn detail(
        &self,
        plugin_id: i64,
        viewer: Option<&Principal>,
    ) -> Result<PluginDetail, MarketError> {
        let plugin = self.moderation.view(plugin_id, viewer).await?;
        let author = self.author(plugin.author_id).await?;

        Ok(PluginDetail {
            html_description: render_markdown(&plugin.fulldesc),
            html_changelog: render_markdown(&plugin.changelog),
            plugin,
            author,
        })
    }

    async fn author(&self, user_id: i64) -> Result<Option<AuthorInfo>, MarketError> {
        let user = self.users.get_user(user_id).await.map_err(fault)?;
        Ok(user.map(AuthorInfo::from))
    }
}
