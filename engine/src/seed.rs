//! Demo data
//!
//! Creates an admin account and a test user with a few approved plugins.
//! Accounts that already exist are left untouched, so seeding twice is
//! harmless. Seeded plugins skip the submission checks.

use sdk::errors::MarketError;
use sdk::types::{PluginStatus, Role};
use serde::Serialize;
use tracing::info;

use crate::auth::CredentialStore;
use crate::db::{fault, NewPlugin, PluginRepository};
use crate::submission::PLACEHOLDER_ICON;

struct SeedPlugin {
    title: &'static str,
    description: &'static str,
    link: &'static str,
}

struct SeedUser {
    name: &'static str,
    email: &'static str,
    password: &'static str,
    role: Role,
    plugins: &'static [SeedPlugin],
}

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        name: "Admin",
        email: "admin@example.com",
        password: "changeme",
        role: Role::Admin,
        plugins: &[],
    },
    SeedUser {
        name: "TestUser",
        email: "499lphg82@example.com",
        password: "example",
        role: Role::User,
        plugins: &[
            SeedPlugin {
                title: "FastTP",
                description: "Instant teleport plugin with cooldown.",
                link: "https://modrinth.com",
            },
            SeedPlugin {
                title: "BetterMOTD",
                description: "Customizable MOTD with gradients.",
                link: "https://spigotmc.org",
            },
            SeedPlugin {
                title: "NoLag",
                description: "Optimizes server tick performance.",
                link: "https://github.com",
            },
        ],
    },
];

/// What a seeding run created
#[derive(Debug, Default, Serialize)]
pub struct SeedReport {
    pub users_created: Vec<String>,
    pub users_skipped: Vec<String>,
    pub plugins_created: usize,
}

/// Insert the demo accounts and plugins that are missing
pub async fn seed(
    credentials: &CredentialStore,
    plugins: &PluginRepository,
) -> Result<SeedReport, MarketError> {
    let mut report = SeedReport::default();

    for entry in SEED_USERS {
        let user = match credentials
            .register(entry.email, entry.password, Some(entry.name))
            .await
        {
            Ok(user) => user,
            Err(MarketError::AlreadyRegistered) => {
                report.users_skipped.push(entry.email.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        if entry.role != Role::User {
            credentials.set_role(entry.email, entry.role).await?;
        }

        for p in entry.plugins {
            let plugin = plugins
                .insert_plugin(&NewPlugin {
                    author_id: user.id,
                    title: p.title.to_string(),
                    shortdesc: p.description.to_string(),
                    fulldesc: p.description.to_string(),
                    icon: PLACEHOLDER_ICON.to_string(),
                    link: p.link.to_string(),
                    ..Default::default()
                })
                .await
                .map_err(fault)?;
            plugins
                .set_status(plugin.id, PluginStatus::Approved, None)
                .await
                .map_err(fault)?;
            report.plugins_created += 1;
        }

        info!("Seeded user {}", entry.email);
        report.users_created.push(entry.email.to_string());
    }

    Ok(report)
}
