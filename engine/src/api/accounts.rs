//! Account and browsing endpoints

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use sdk::errors::MarketError;
use sdk::types::Principal;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::extract::{clear_session_cookie, session_cookie, session_token, CurrentPrincipal};
use super::AppState;
use crate::catalog::ListedPlugin;
use crate::db::{Plugin, User};
use crate::moderation::Policy;

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Register form fields safe to echo back
#[derive(Debug, Serialize)]
struct RegisterEcho<'a> {
    email: &'a str,
    name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub user: Option<Principal>,
    pub plugins: Vec<ListedPlugin>,
}

/// Where unauthenticated requests are redirected
#[derive(Debug, Serialize)]
pub struct LoginHint {
    pub message: &'static str,
    pub method: &'static str,
    pub fields: [&'static str; 2],
    pub register: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: Principal,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: Principal,
    pub plugins: Vec<Plugin>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/register", post(register))
        .route("/login", get(login_hint).post(login))
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard))
        .route("/account/password", post(change_password))
}

async fn home(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
) -> Result<Json<HomeResponse>, ApiError> {
    let plugins = state.catalog.recent().await?;
    Ok(Json(HomeResponse {
        user: principal.0,
        plugins,
    }))
}

async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let user = state
        .credentials
        .register(&form.email, &form.password, form.name.as_deref())
        .await
        .map_err(|e| {
            ApiError::with_form(
                e,
                &RegisterEcho {
                    email: &form.email,
                    name: form.name.as_deref(),
                },
            )
        })?;

    Ok(start_session(&state, &user, StatusCode::CREATED))
}

async fn login_hint(principal: CurrentPrincipal) -> Json<LoginHint> {
    let message = if principal.get().is_some() {
        "Already logged in"
    } else {
        "Please log in to continue"
    };
    Json(LoginHint {
        message,
        method: "POST",
        fields: ["email", "password"],
        register: "/register",
    })
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let user = state
        .credentials
        .authenticate(&form.email, &form.password)
        .await
        .map_err(|e| ApiError::with_form(e, &serde_json::json!({ "email": form.email })))?;

    Ok(start_session(&state, &user, StatusCode::OK))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.close(&token);
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}

async fn dashboard(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
) -> Result<Json<DashboardResponse>, ApiError> {
    let plugins = state.catalog.dashboard(principal.get()).await?;
    // dashboard() already refused an anonymous caller
    let user = principal.0.ok_or(MarketError::Unauthenticated)?;
    Ok(Json(DashboardResponse { user, plugins }))
}

async fn change_password(
    State(state): State<AppState>,
    principal: CurrentPrincipal,
    Form(form): Form<ChangePasswordForm>,
) -> Result<StatusCode, ApiError> {
    let user = Policy::require_authenticated(principal.get())?;
    state
        .credentials
        .change_password(user.id, &form.old_password, &form.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn start_session(state: &AppState, user: &User, status: StatusCode) -> Response {
    let token = state.sessions.open(user.id);
    let body = Json(SessionResponse {
        token: token.clone(),
        user: user.principal(),
    });

    match session_cookie(&token, state.sessions.ttl()) {
        Some(cookie) => (status, [(header::SET_COOKIE, cookie)], body).into_response(),
        None => (status, body).into_response(),
    }
}
