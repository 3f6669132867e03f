//! Error responses for the HTTP adapter

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use sdk::errors::{MarketError, PlostErrorExt};
use serde::Serialize;
use serde_json::Value;

/// Where unauthenticated requests are sent
pub const LOGIN_PATH: &str = "/login";

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Value>,
}

/// A marketplace error with the form that produced it
#[derive(Debug)]
pub struct ApiError {
    pub error: MarketError,
    pub form: Option<Value>,
}

impl ApiError {
    /// Echo the submitted form back with the error
    pub fn with_form<T: Serialize>(error: MarketError, form: &T) -> Self {
        Self {
            error,
            form: serde_json::to_value(form).ok(),
        }
    }

    pub fn status(&self) -> StatusCode {
        status_for(&self.error)
    }
}

impl From<MarketError> for ApiError {
    fn from(error: MarketError) -> Self {
        Self { error, form: None }
    }
}

/// HTTP status for an error kind
pub fn status_for(error: &MarketError) -> StatusCode {
    match error {
        MarketError::MissingFields
        | MarketError::FieldTooLong { .. }
        | MarketError::InvalidAsset(_)
        | MarketError::UnreachableLink(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketError::AlreadyRegistered => StatusCode::CONFLICT,
        MarketError::InvalidCredentials | MarketError::WrongPassword => StatusCode::UNAUTHORIZED,
        MarketError::Unauthenticated => StatusCode::SEE_OTHER,
        MarketError::Forbidden | MarketError::NotAvailable(_) => StatusCode::FORBIDDEN,
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::Storage(_) | MarketError::Config(_) | MarketError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self.error, MarketError::Unauthenticated) {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        if self.error.is_expected() {
            tracing::debug!("Request refused: {}", self.error);
        } else {
            tracing::error!("Request failed: {:?}", self.error);
        }

        let status = self.status();
        // Faults never expose their detail to the client
        let error = if self.error.is_expected() {
            self.error.to_string()
        } else {
            "Internal error".to_string()
        };

        let body = ErrorBody {
            error,
            code: self.error.code(),
            hint: self.error.user_hint().to_string(),
            form: self.form,
        };

        (status, Json(body)).into_response()
    }
}
