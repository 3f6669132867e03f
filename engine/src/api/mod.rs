//! HTTP adapter
//!
//! Thin axum layer over the marketplace services. Handlers parse the
//! request, pass the current principal into the service call, and map the
//! outcome to a response. No authorization decision is made here.
//!
//! # Routes
//!
//! - GET  /                          - newest approved plugins
//! - POST /register, /login          - open a session
//! - GET  /logout                    - close the session
//! - GET  /dashboard                 - the caller's own plugins
//! - POST /account/password          - change password
//! - POST /plugins/new               - multipart submission
//! - GET  /plugins/:id               - plugin detail
//! - GET  /moderation                - pending queue
//! - POST /moderation/:id/approve    - approve
//! - POST /moderation/:id/reject     - reject with `reason`
//! - GET  /uploads/*                 - stored icons

use axum::{
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use sdk::errors::MarketError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::auth::{CredentialStore, PasswordHashing, SessionStore};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::Database;
use crate::moderation::ModerationEngine;
use crate::submission::{assets::UPLOADS_ROUTE, AssetStore, LinkProbe, SubmissionService, SubmissionValidator};

pub mod accounts;
pub mod error;
pub mod extract;
pub mod moderation;
pub mod plugins;

pub use error::ApiError;
pub use extract::CurrentPrincipal;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="128" height="128" viewBox="0 0 128 128"><rect width="128" height="128" rx="16" fill="#d8dee9"/><path d="M44 40h40v48H44z" fill="none" stroke="#4c566a" stroke-width="6"/><circle cx="64" cy="64" r="8" fill="#4c566a"/></svg>"##;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub sessions: SessionStore,
    pub catalog: Catalog,
    pub moderation: ModerationEngine,
    pub submissions: SubmissionService,
}

impl AppState {
    /// Wire the services over an open database
    pub fn from_parts(
        db: &Database,
        config: &Config,
        probe: Arc<dyn LinkProbe>,
    ) -> Result<Self, MarketError> {
        let hashing = PasswordHashing::new(&config.security)?;
        let credentials = CredentialStore::new(db.users(), hashing);
        let sessions = SessionStore::new(Duration::from_secs(config.server.session_ttl_secs));
        let moderation = ModerationEngine::new(db.plugins(), db.users());
        let catalog = Catalog::new(db.plugins(), db.users(), moderation.clone());

        let assets = AssetStore::new(config.uploads_dir(), config.submission.max_icon_bytes);
        let validator = SubmissionValidator::new(probe, config.submission.max_short_description);
        let submissions = SubmissionService::new(validator, db.plugins(), assets);

        Ok(Self {
            credentials,
            sessions,
            catalog,
            moderation,
            submissions,
        })
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.submissions.assets().dir());

    Router::new()
        .merge(accounts::router())
        .merge(plugins::router(state.submissions.assets().max_bytes()))
        .merge(moderation::router())
        .route("/placeholder.svg", get(placeholder_icon))
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn placeholder_icon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], PLACEHOLDER_SVG)
}

/// Serve until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!("Plost listening on http://{}", local);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
