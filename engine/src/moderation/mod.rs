//! Visibility & moderation engine
//!
//! Plugins move between three states under moderator control:
//!
//! ```text
//!   pending ──approve──▶ approved
//!      │                  ▲   │
//!    reject          approve reject
//!      ▼                  │   ▼
//!   rejected ◀────────────┴───┘
//! ```
//!
//! There is no terminal state; any status can be re-reviewed. Approving
//! clears the reject reason, rejecting always stores one.
//!
//! Visibility is evaluated on every fetch through [`Policy`]; nothing here
//! caches a decision.

use sdk::errors::MarketError;
use sdk::types::{PluginStatus, Principal};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::db::{fault, Plugin, PluginRepository, UserRepository};

pub mod policy;

pub use policy::Policy;

/// Longest stored reject reason, in characters
pub const MAX_REJECT_REASON: usize = 500;

/// Reason stored when a moderator gives none
pub const DEFAULT_REJECT_REASON: &str = "Rejected";

/// A pending plugin with its author's email
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    #[serde(flatten)]
    pub plugin: Plugin,
    pub author_email: Option<String>,
}

/// Clamp a moderator's reason to the stored form
///
/// Empty or missing reasons become [`DEFAULT_REJECT_REASON`].
pub fn normalize_reason(reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r.chars().take(MAX_REJECT_REASON).collect(),
        None => DEFAULT_REJECT_REASON.to_string(),
    }
}

/// Moderation workflow over the plugin store
#[derive(Clone)]
pub struct ModerationEngine {
    plugins: PluginRepository,
    users: UserRepository,
}

impl ModerationEngine {
    pub fn new(plugins: PluginRepository, users: UserRepository) -> Self {
        Self { plugins, users }
    }

    /// Approve a plugin and clear any reject reason
    ///
    /// Approving an already approved plugin succeeds and changes nothing.
    pub async fn approve(
        &self,
        plugin_id: i64,
        actor: Option<&Principal>,
    ) -> Result<Plugin, MarketError> {
        let actor = Policy::require_moderator(actor)?;
        self.transition(plugin_id, PluginStatus::Approved, None)
            .await?;
        info!("Plugin {} approved by user {}", plugin_id, actor.id);
        self.load(plugin_id).await
    }

    /// Reject a plugin with a reason
    ///
    /// The reason is trimmed and cut to [`MAX_REJECT_REASON`] characters.
    pub async fn reject(
        &self,
        plugin_id: i64,
        actor: Option<&Principal>,
        reason: Option<&str>,
    ) -> Result<Plugin, MarketError> {
        let actor = Policy::require_moderator(actor)?;
        let reason = normalize_reason(reason);
        self.transition(plugin_id, PluginStatus::Rejected, Some(&reason))
            .await?;
        info!("Plugin {} rejected by user {}", plugin_id, actor.id);
        self.load(plugin_id).await
    }

    /// The moderation queue, oldest submission first
    pub async fn queue(&self, actor: Option<&Principal>) -> Result<Vec<QueueEntry>, MarketError> {
        Policy::require_moderator(actor)?;
        self.pending().await
    }

    /// Pending plugins with author emails, without an authorization check
    ///
    /// For operator tooling that runs outside any request.
    pub async fn pending(&self) -> Result<Vec<QueueEntry>, MarketError> {
        let plugins = self
            .plugins
            .list_by_status(PluginStatus::Pending)
            .await
            .map_err(fault)?;

        let mut emails: HashMap<i64, Option<String>> = HashMap::new();
        let mut queue = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            if !emails.contains_key(&plugin.author_id) {
                let author = self
                    .users
                    .get_user(plugin.author_id)
                    .await
                    .map_err(fault)?;
                emails.insert(plugin.author_id, author.map(|a| a.email));
            }
            let author_email = emails.get(&plugin.author_id).cloned().flatten();
            queue.push(QueueEntry {
                plugin,
                author_email,
            });
        }

        Ok(queue)
    }

    /// Fetch a plugin for a viewer
    ///
    /// # Errors
    ///
    /// - `NotFound` when the id does not exist
    /// - `NotAvailable` when it exists but this viewer may not see it
    pub async fn view(
        &self,
        plugin_id: i64,
        viewer: Option<&Principal>,
    ) -> Result<Plugin, MarketError> {
        let plugin = self.load(plugin_id).await?;

        if Policy::can_view(viewer, &plugin) {
            Ok(plugin)
        } else {
            debug!(
                "Plugin {} ({}) hidden from viewer {:?}",
                plugin_id,
                plugin.status,
                viewer.map(|v| v.id)
            );
            Err(MarketError::NotAvailable(plugin_id))
        }
    }

    async fn transition(
        &self,
        plugin_id: i64,
        status: PluginStatus,
        reason: Option<&str>,
    ) -> Result<(), MarketError> {
        let updated = self
            .plugins
            .set_status(plugin_id, status, reason)
            .await
            .map_err(fault)?;

        if updated {
            Ok(())
        } else {
            Err(MarketError::NotFound(plugin_id))
        }
    }

    async fn load(&self, plugin_id: i64) -> Result<Plugin, MarketError> {
        self.plugins
            .get_plugin(plugin_id)
            .await
            .map_err(fault)?
            .ok_or(MarketError::NotFound(plugin_id))
    }
}
