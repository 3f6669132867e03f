//! Plugin submission and detail endpoints

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sdk::errors::MarketError;

use super::error::ApiError;
use super::extract::CurrentPrincipal;
use super::AppState;
use crate::catalog::PluginDetail;
use crate::db::Plugin;
use crate::moderation::Policy;
use crate::submission::{AssetStore, StagedUpload, StagingFile, SubmissionForm};

/// Multipart part carrying the icon file
pub const ICON_FIELD: &str = "icon";

/// Room for the text fields on top of the icon limit
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(max_icon_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_icon_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/plugins/new",
            post(submit).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/plugins/:id", get(detail))
}

async fn submit(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Plugin>), ApiError> {
    // Refuse before reading the body so nothing gets staged
    Policy::require_authenticated(principal.get())?;

    let (form, icon) = read_submission(state.submissions.assets(), multipart).await?;

    let plugin = state
        .submissions
        .submit(principal.get(), form.clone(), icon)
        .await
        .map_err(|e| ApiError::with_form(e, &form))?;

    Ok((StatusCode::CREATED, Json(plugin)))
}

async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    principal: CurrentPrincipal,
) -> Result<Json<PluginDetail>, ApiError> {
    let detail = state.catalog.detail(id, principal.get()).await?;
    Ok(Json(detail))
}

/// Collect text fields and stage the icon part
///
/// When the icon stream breaks (client gone, body limit hit) reading stops
/// and the upload is marked interrupted, so the submission checks still
/// run in order and report missing fields first. Any other unreadable body
/// is reported as `MissingFields`. Staged files are removed when dropped.
async fn read_submission(
    assets: &AssetStore,
    mut multipart: Multipart,
) -> Result<(SubmissionForm, Option<StagedUpload>), ApiError> {
    let mut form = SubmissionForm::default();
    let mut icon: Option<StagedUpload> = None;
    let mut body_broken = false;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Malformed multipart body: {}", e);
                body_broken = true;
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == ICON_FIELD {
            // Only the last icon part counts
            drop(icon.take());

            let staging = assets
                .begin(
                    field.file_name().map(String::from),
                    field.content_type().map(String::from),
                )
                .await?;
            let staged = stream_icon(staging, field)
                .await
                .map_err(|e| ApiError::with_form(e, &form))?;
            let interrupted = staged.is_interrupted();
            icon = Some(staged);
            if interrupted {
                body_broken = true;
                break;
            }
        } else {
            match field.text().await {
                Ok(value) => {
                    if !form.set_field(&name, value) {
                        tracing::debug!("Ignoring unknown form field '{}'", name);
                    }
                }
                Err(e) => {
                    tracing::debug!("Unreadable form field '{}': {}", name, e);
                    body_broken = true;
                    break;
                }
            }
        }
    }

    let icon_interrupted = icon.as_ref().is_some_and(StagedUpload::is_interrupted);
    if body_broken && !icon_interrupted {
        return Err(ApiError::with_form(MarketError::MissingFields, &form));
    }

    Ok((form, icon))
}

async fn stream_icon(
    mut staging: StagingFile,
    mut field: Field<'_>,
) -> Result<StagedUpload, MarketError> {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => staging.write_chunk(&chunk).await?,
            Ok(None) => return staging.finish().await,
            Err(e) => {
                tracing::debug!("Icon upload interrupted: {}", e);
                return Ok(staging.interrupted());
            }
        }
    }
}
