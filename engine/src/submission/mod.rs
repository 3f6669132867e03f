//! Submission validator
//!
//! Turns a candidate plugin into a pending record, or rejects it with the
//! first failing check:
//!
//! 1. required fields present (`MissingFields`)
//! 2. short description length (`FieldTooLong`)
//! 3. icon content and size (`InvalidAsset`)
//! 4. external link reachability (`UnreachableLink`)
//!
//! Whatever the outcome, a staged icon is either promoted or removed before
//! the call returns, and the same holds when the call is cancelled midway.
//! Rejected submissions leave nothing in the uploads directory and nothing
//! in the store.

use sdk::errors::MarketError;
use sdk::types::Principal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{fault, NewPlugin, Plugin, PluginRepository};
use crate::moderation::Policy;

pub mod assets;
pub mod link_probe;

pub use assets::{AssetStore, PublishedIcon, StagedUpload, StagingFile, PLACEHOLDER_ICON};
pub use link_probe::{HttpLinkProbe, LinkProbe};

/// Text fields of a plugin submission as received
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionForm {
    pub title: String,
    pub shortdesc: String,
    pub fulldesc: String,
    pub changelog: String,
    pub tags: String,
    pub versions: String,
    pub link: String,
}

impl SubmissionForm {
    /// Assign a named multipart text field
    ///
    /// Returns false for names that are not part of the form.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "title" => &mut self.title,
            "shortdesc" => &mut self.shortdesc,
            "fulldesc" => &mut self.fulldesc,
            "changelog" => &mut self.changelog,
            "tags" => &mut self.tags,
            "versions" => &mut self.versions,
            "link" => &mut self.link,
            _ => return false,
        };
        *slot = value;
        true
    }

    fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            shortdesc: self.shortdesc.trim().to_string(),
            fulldesc: self.fulldesc,
            changelog: self.changelog,
            tags: self.tags.trim().to_string(),
            versions: self.versions.trim().to_string(),
            link: self.link.trim().to_string(),
        }
    }

    fn missing_required(&self) -> bool {
        [&self.title, &self.shortdesc, &self.fulldesc, &self.link]
            .iter()
            .any(|v| v.trim().is_empty())
    }
}

/// A submission that passed every check
#[derive(Debug)]
pub struct ValidatedSubmission {
    pub form: SubmissionForm,
    pub icon: Option<StagedUpload>,
}

/// Ordered submission checks
#[derive(Clone)]
pub struct SubmissionValidator {
    probe: Arc<dyn LinkProbe>,
    max_short_description: usize,
}

impl SubmissionValidator {
    pub fn new(probe: Arc<dyn LinkProbe>, max_short_description: usize) -> Self {
        Self {
            probe,
            max_short_description,
        }
    }

    /// Run all checks, short-circuiting on the first failure
    ///
    /// A staged icon is removed on every rejection. An empty file input
    /// counts as no icon.
    pub async fn validate(
        &self,
        form: SubmissionForm,
        icon: Option<StagedUpload>,
    ) -> Result<ValidatedSubmission, MarketError> {
        let icon = match icon {
            Some(upload) if upload.is_blank() => {
                upload.discard();
                None
            }
            other => other,
        };

        match self.check(&form, icon.as_ref()).await {
            Ok(()) => Ok(ValidatedSubmission {
                form: form.normalized(),
                icon,
            }),
            Err(e) => {
                debug!("Submission rejected: {}", e);
                if let Some(upload) = icon {
                    upload.discard();
                }
                Err(e)
            }
        }
    }

    async fn check(
        &self,
        form: &SubmissionForm,
        icon: Option<&StagedUpload>,
    ) -> Result<(), MarketError> {
        if form.missing_required() {
            return Err(MarketError::MissingFields);
        }

        if form.shortdesc.trim().chars().count() > self.max_short_description {
            return Err(MarketError::FieldTooLong {
                field: "shortdesc",
                limit: self.max_short_description,
            });
        }

        if let Some(upload) = icon {
            check_icon(upload)?;
        }

        let link = form.link.trim();
        if !self.probe.is_reachable(link).await {
            return Err(MarketError::UnreachableLink(link.to_string()));
        }

        Ok(())
    }
}

fn check_icon(upload: &StagedUpload) -> Result<(), MarketError> {
    if upload.is_interrupted() {
        return Err(MarketError::InvalidAsset("upload interrupted".to_string()));
    }
    if upload.is_oversized() {
        return Err(MarketError::InvalidAsset("file too large".to_string()));
    }
    if upload.size() == 0 {
        return Err(MarketError::InvalidAsset("empty file".to_string()));
    }

    let declared = upload
        .content_type()
        .map(|ct| ct.trim().to_ascii_lowercase());
    let declared_ok = declared
        .as_deref()
        .map_or(false, |ct| assets::ALLOWED_CONTENT_TYPES.contains(&ct));
    if !declared_ok {
        return Err(MarketError::InvalidAsset(format!(
            "unsupported content type {}",
            declared.as_deref().unwrap_or("(none)")
        )));
    }

    if upload.detected_kind().is_none() {
        return Err(MarketError::InvalidAsset(
            "content is not a PNG or JPEG image".to_string(),
        ));
    }

    Ok(())
}

/// Submission workflow: validate, store the icon, persist as pending
#[derive(Clone)]
pub struct SubmissionService {
    validator: SubmissionValidator,
    plugins: PluginRepository,
    assets: AssetStore,
}

impl SubmissionService {
    pub fn new(validator: SubmissionValidator, plugins: PluginRepository, assets: AssetStore) -> Self {
        Self {
            validator,
            plugins,
            assets,
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Submit a plugin on behalf of `author`
    ///
    /// The stored record is always pending with no reject reason.
    pub async fn submit(
        &self,
        author: Option<&Principal>,
        form: SubmissionForm,
        icon: Option<StagedUpload>,
    ) -> Result<Plugin, MarketError> {
        let author = match Policy::require_authenticated(author) {
            Ok(author) => author,
            Err(e) => {
                if let Some(upload) = icon {
                    upload.discard();
                }
                return Err(e);
            }
        };

        let ValidatedSubmission { form, icon } = self.validator.validate(form, icon).await?;

        // Removed again on drop until the record referencing it is stored
        let icon = icon.map(StagedUpload::promote).transpose()?;
        let icon_url = icon
            .as_ref()
            .map_or(PLACEHOLDER_ICON, PublishedIcon::url)
            .to_string();

        let new_plugin = NewPlugin {
            author_id: author.id,
            title: form.title,
            shortdesc: form.shortdesc,
            fulldesc: form.fulldesc,
            changelog: form.changelog,
            tags: form.tags,
            versions: form.versions,
            icon: icon_url,
            link: form.link,
        };

        let plugin = self.plugins.insert_plugin(&new_plugin).await.map_err(fault)?;
        if let Some(icon) = icon {
            icon.keep();
        }

        info!("Plugin {} submitted by user {}", plugin.id, author.id);
        Ok(plugin)
    }
}
