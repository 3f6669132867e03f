/// Plugin record persistence
///
/// This module stores submitted plugin entries and their moderation state.
/// Status changes go through `set_status`, which writes status and reject
/// reason together so the pair can never disagree.
/// All queries use parameterized queries for SQL injection prevention.
use anyhow::{Context, Result};
use sdk::types::PluginStatus;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::unix_now;

/// Plugin record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub shortdesc: String,
    pub fulldesc: String,
    pub changelog: String,
    pub tags: String,
    pub versions: String,
    pub icon: String,
    pub link: String,
    pub status: PluginStatus,
    pub reject_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields of a plugin about to be inserted
///
/// There is no status field: every new record starts out pending.
#[derive(Debug, Clone, Default)]
pub struct NewPlugin {
    pub author_id: i64,
    pub title: String,
    pub shortdesc: String,
    pub fulldesc: String,
    pub changelog: String,
    pub tags: String,
    pub versions: String,
    pub icon: String,
    pub link: String,
}

const PLUGIN_COLUMNS: &str = "id, author_id, title, shortdesc, fulldesc, changelog, tags, versions, icon, link, status, reject_reason, created_at, updated_at";

fn plugin_from_row(r: &SqliteRow) -> Result<Plugin> {
    let status: String = r.get("status");
    Ok(Plugin {
        id: r.get("id"),
        author_id: r.get("author_id"),
        title: r.get("title"),
        shortdesc: r.get("shortdesc"),
        fulldesc: r.get("fulldesc"),
        changelog: r.get("changelog"),
        tags: r.get("tags"),
        versions: r.get("versions"),
        icon: r.get("icon"),
        link: r.get("link"),
        status: status.parse()?,
        reject_reason: r.get("reject_reason"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn plugins_from_rows(rows: Vec<SqliteRow>) -> Result<Vec<Plugin>> {
    rows.iter().map(plugin_from_row).collect()
}

/// Plugin repository for database operations
#[derive(Clone)]
pub struct PluginRepository {
    pool: SqlitePool,
}

impl PluginRepository {
    /// Create a new plugin repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a plugin in status `pending`
    pub async fn insert_plugin(&self, new: &NewPlugin) -> Result<Plugin> {
        let now = unix_now()?;
        let status = PluginStatus::Pending;

        let done = sqlx::query(
            "INSERT INTO plugins (author_id, title, shortdesc, fulldesc, changelog, tags, versions, icon, link, status, reject_reason, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)"
        )
        .bind(new.author_id)
        .bind(&new.title)
        .bind(&new.shortdesc)
        .bind(&new.fulldesc)
        .bind(&new.changelog)
        .bind(&new.tags)
        .bind(&new.versions)
        .bind(&new.icon)
        .bind(&new.link)
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to insert plugin")?;

        Ok(Plugin {
            id: done.last_insert_rowid(),
            author_id: new.author_id,
            title: new.title.clone(),
            shortdesc: new.shortdesc.clone(),
            fulldesc: new.fulldesc.clone(),
            changelog: new.changelog.clone(),
            tags: new.tags.clone(),
            versions: new.versions.clone(),
            icon: new.icon.clone(),
            link: new.link.clone(),
            status,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a plugin by ID
    pub async fn get_plugin(&self, id: i64) -> Result<Option<Plugin>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plugins WHERE id = ?",
            PLUGIN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch plugin")?;

        row.as_ref().map(plugin_from_row).transpose()
    }

    /// Get all plugins in a status, oldest first
    ///
    /// Ids are assigned monotonically, so ascending id is creation order.
    pub async fn list_by_status(&self, status: PluginStatus) -> Result<Vec<Plugin>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plugins WHERE status = ? ORDER BY id ASC",
            PLUGIN_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch plugins by status")?;

        plugins_from_rows(rows)
    }

    /// Get the newest plugins in a status, newest first
    pub async fn list_recent(&self, status: PluginStatus, limit: i64) -> Result<Vec<Plugin>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plugins WHERE status = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            PLUGIN_COLUMNS
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent plugins")?;

        plugins_from_rows(rows)
    }

    /// Get every plugin owned by an author, newest first
    pub async fn list_by_author(&self, author_id: i64) -> Result<Vec<Plugin>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plugins WHERE author_id = ? ORDER BY id DESC",
            PLUGIN_COLUMNS
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch plugins by author")?;

        plugins_from_rows(rows)
    }

    /// Write status and reject reason in one statement
    ///
    /// The reason is stored only for `rejected` and cleared otherwise.
    /// Returns false when no plugin has this id.
    pub async fn set_status(
        &self,
        id: i64,
        status: PluginStatus,
        reject_reason: Option<&str>,
    ) -> Result<bool> {
        let now = unix_now()?;
        let reason = match status {
            PluginStatus::Rejected => Some(reject_reason.unwrap_or_default()),
            PluginStatus::Pending | PluginStatus::Approved => None,
        };

        let done =
            sqlx::query("UPDATE plugins SET status = ?, reject_reason = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(reason)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await
                .context("Failed to set plugin status")?;

        Ok(done.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Database, i64) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("plugins.db")).await.unwrap();
        let author = db
            .users()
            .create_user("author@x.com", "hash", None)
            .await
            .unwrap()
            .unwrap();
        (temp_dir, db, author.id)
    }

    fn sample(author_id: i64, title: &str) -> NewPlugin {
        NewPlugin {
            author_id,
            title: title.to_string(),
            shortdesc: "short".to_string(),
            fulldesc: "# Full".to_string(),
            icon: "/placeholder.svg".to_string(),
            link: "https://example.com".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_is_pending() {
        let (_dir, db, author) = setup().await;
        let repo = db.plugins();

        let plugin = repo.insert_plugin(&sample(author, "FastTP")).await.unwrap();
        assert_eq!(plugin.status, PluginStatus::Pending);
        assert!(plugin.reject_reason.is_none());

        let stored = repo.get_plugin(plugin.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "FastTP");
        assert_eq!(stored.status, PluginStatus::Pending);
        assert!(repo.get_plugin(plugin.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_author_rejected_by_foreign_key() {
        let (_dir, db, author) = setup().await;
        let result = db.plugins().insert_plugin(&sample(author + 99, "Orphan")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_set_status_keeps_reason_consistent() {
        let (_dir, db, author) = setup().await;
        let repo = db.plugins();
        let plugin = repo.insert_plugin(&sample(author, "NoLag")).await.unwrap();

        assert!(repo
            .set_status(plugin.id, PluginStatus::Rejected, Some("broken link"))
            .await
            .unwrap());
        let rejected = repo.get_plugin(plugin.id).await.unwrap().unwrap();
        assert_eq!(rejected.reject_reason.as_deref(), Some("broken link"));

        // A stray reason on approval is dropped
        assert!(repo
            .set_status(plugin.id, PluginStatus::Approved, Some("ignored"))
            .await
            .unwrap());
        let approved = repo.get_plugin(plugin.id).await.unwrap().unwrap();
        assert_eq!(approved.status, PluginStatus::Approved);
        assert!(approved.reject_reason.is_none());

        assert!(!repo
            .set_status(plugin.id + 100, PluginStatus::Approved, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_listing_orders() {
        let (_dir, db, author) = setup().await;
        let repo = db.plugins();

        let first = repo.insert_plugin(&sample(author, "one")).await.unwrap();
        let second = repo.insert_plugin(&sample(author, "two")).await.unwrap();
        let third = repo.insert_plugin(&sample(author, "three")).await.unwrap();

        let pending: Vec<i64> = repo
            .list_by_status(PluginStatus::Pending)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(pending, vec![first.id, second.id, third.id]);

        let mine: Vec<i64> = repo
            .list_by_author(author)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(mine, vec![third.id, second.id, first.id]);

        repo.set_status(first.id, PluginStatus::Approved, None)
            .await
            .unwrap();
        repo.set_status(third.id, PluginStatus::Approved, None)
            .await
            .unwrap();

        let recent: Vec<i64> = repo
            .list_recent(PluginStatus::Approved, 1)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(recent, vec![third.id]);
    }
}
