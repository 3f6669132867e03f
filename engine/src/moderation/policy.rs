//! Capability checks
//!
//! The single place that decides who may view, moderate, or act as an
//! authenticated user. Every protected operation goes through here.
//!
//! A missing principal and an insufficient role are different outcomes:
//! the first is `Unauthenticated` (go log in), the second `Forbidden`.

use sdk::errors::MarketError;
use sdk::types::{PluginStatus, Principal};

use crate::db::Plugin;

/// Authorization policy
pub struct Policy;

impl Policy {
    /// Require any logged-in principal
    pub fn require_authenticated(viewer: Option<&Principal>) -> Result<&Principal, MarketError> {
        viewer.ok_or(MarketError::Unauthenticated)
    }

    /// Require a principal with governance authority (moderator or admin)
    pub fn require_moderator(viewer: Option<&Principal>) -> Result<&Principal, MarketError> {
        let principal = Self::require_authenticated(viewer)?;
        if Self::can_moderate(principal) {
            Ok(principal)
        } else {
            Err(MarketError::Forbidden)
        }
    }

    /// Whether a principal may approve or reject plugins
    pub fn can_moderate(principal: &Principal) -> bool {
        principal.role.is_elevated()
    }

    /// Whether a viewer may see a plugin's detail
    pub fn can_view(viewer: Option<&Principal>, plugin: &Plugin) -> bool {
        Self::is_visible(viewer, plugin.status, plugin.author_id)
    }

    /// Visibility rule on raw fields
    ///
    /// Approved plugins are public. Anything else is limited to its author
    /// and to moderators/admins.
    pub fn is_visible(viewer: Option<&Principal>, status: PluginStatus, author_id: i64) -> bool {
        if status == PluginStatus::Approved {
            return true;
        }
        match viewer {
            Some(v) => v.id == author_id || Self::can_moderate(v),
            None => false,
        }
    }
}
