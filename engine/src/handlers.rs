//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: run the HTTP server
//! - seed: insert demo data
//! - set-role: assign a role to an account
//! - queue: print the moderation queue

use anyhow::{Context, Result};
use sdk::types::Role;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::{self, AppState};
use crate::auth::{CredentialStore, PasswordHashing};
use crate::config::Config;
use crate::db::Database;
use crate::moderation::ModerationEngine;
use crate::seed;
use crate::submission::HttpLinkProbe;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::new(&config.database_path())
        .await
        .context("Failed to open database")
}

fn credential_store(db: &Database, config: &Config) -> Result<CredentialStore> {
    let hashing = PasswordHashing::new(&config.security)?;
    Ok(CredentialStore::new(db.users(), hashing))
}

/// Run the HTTP server until Ctrl-C, then flush the store
pub async fn handle_serve(config: &Config, port: Option<u16>) -> Result<()> {
    let db = open_database(config).await?;
    let probe = HttpLinkProbe::from_config(&config.submission)?;
    let state = AppState::from_parts(&db, config, Arc::new(probe))?;
    state.submissions.assets().purge_staging().await?;

    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, port))?;

    let result = api::serve(state, addr).await;

    if let Err(e) = db.flush_wal().await {
        tracing::warn!("Failed to flush WAL: {}", e);
    }
    db.close().await?;

    result
}

/// Insert demo accounts and plugins
pub async fn handle_seed(config: &Config, format: OutputFormat) -> Result<()> {
    let db = open_database(config).await?;
    let credentials = credential_store(&db, config)?;

    let report = seed::seed(&credentials, &db.plugins()).await?;

    match format {
        OutputFormat::Text => {
            for email in &report.users_created {
                println!("✓ Created {}", email);
            }
            for email in &report.users_skipped {
                println!("- {} already exists, skipped", email);
            }
            println!("{} plugin(s) created", report.plugins_created);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    db.close().await?;
    Ok(())
}

/// Assign a role to an account
pub async fn handle_set_role(
    config: &Config,
    email: &str,
    role: Role,
    format: OutputFormat,
) -> Result<()> {
    let db = open_database(config).await?;
    let credentials = credential_store(&db, config)?;

    let updated = credentials.set_role(email, role).await?;
    db.close().await?;

    match format {
        OutputFormat::Text => {
            if updated {
                println!("✓ {} is now {}", email, role);
            } else {
                println!("No account with email {}", email);
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "email": email,
                "role": role,
                "updated": updated,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if updated {
        Ok(())
    } else {
        anyhow::bail!("No account with email {}", email)
    }
}

/// Print pending plugins, oldest first
pub async fn handle_queue(config: &Config, format: OutputFormat) -> Result<()> {
    let db = open_database(config).await?;
    let moderation = ModerationEngine::new(db.plugins(), db.users());

    let queue = moderation.pending().await?;
    db.close().await?;

    match format {
        OutputFormat::Text => {
            if queue.is_empty() {
                println!("Moderation queue is empty.");
                return Ok(());
            }
            println!("{:<6} {:<30} {}", "ID", "TITLE", "AUTHOR");
            for entry in &queue {
                println!(
                    "{:<6} {:<30} {}",
                    entry.plugin.id,
                    truncate(&entry.plugin.title, 30),
                    entry.author_email.as_deref().unwrap_or("(unknown)")
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&queue)?);
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::with_data_dir(dir.path()).unwrap();
        config.security.memory_kib = 1024;
        config.security.iterations = 1;
        config
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 30), "short");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }

    #[tokio::test]
    async fn test_seed_then_set_role_then_queue() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        handle_seed(&config, OutputFormat::Json).await.unwrap();
        handle_set_role(&config, "499lphg82@example.com", Role::Moderator, OutputFormat::Text)
            .await
            .unwrap();
        handle_queue(&config, OutputFormat::Text).await.unwrap();

        let missing =
            handle_set_role(&config, "ghost@example.com", Role::Admin, OutputFormat::Json).await;
        assert!(missing.is_err());
    }
}
