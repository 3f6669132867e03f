//! Request principal extraction
//!
//! The session token is read from the `plost_session` cookie, or from an
//! `Authorization: Bearer` header for non-browser clients. The principal is
//! loaded fresh from the store for every request.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use sdk::types::Principal;
use std::time::Duration;

use super::error::ApiError;
use super::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "plost_session";

/// The principal attached to a request, if any
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Option<Principal>);

impl CurrentPrincipal {
    pub fn get(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(Self(None));
        };
        let Some(user_id) = state.sessions.resolve(&token) else {
            return Ok(Self(None));
        };

        let principal = state.credentials.principal(user_id).await?;
        if principal.is_none() {
            // Account vanished under a live session
            state.sessions.close(&token);
        }
        Ok(Self(principal))
    }
}

/// Session token carried by a request
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(bearer.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value opening a session
pub fn session_cookie(token: &str, ttl: Duration) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    ))
    .ok()
}

/// `Set-Cookie` value clearing the session
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("plost_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
