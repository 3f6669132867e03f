//! Moderation endpoints (moderator or admin)

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use super::error::ApiError;
use super::extract::CurrentPrincipal;
use super::AppState;
use crate::db::Plugin;
use crate::moderation::QueueEntry;

#[derive(Debug, Deserialize)]
pub struct RejectForm {
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/moderation", get(queue))
        .route("/moderation/:id/approve", post(approve))
        .route("/moderation/:id/reject", post(reject))
}

async fn queue(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
) -> Result<Json<Vec<QueueEntry>>, ApiError> {
    Ok(Json(state.moderation.queue(principal.get()).await?))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<Json<Plugin>, ApiError> {
    Ok(Json(state.moderation.approve(id, principal.get()).await?))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    principal: CurrentPrincipal,
    form: Option<Form<RejectForm>>,
) -> Result<Json<Plugin>, ApiError> {
    let reason = form.and_then(|Form(f)| f.reason);
    let plugin = state
        .moderation
        .reject(id, principal.get(), reason.as_deref())
        .await?;
    Ok(Json(plugin))
}
