//! Error types and handling
//!
//! This module provides the error taxonomy used throughout the marketplace.
//! Every error implements `PlostErrorExt`, which provides a user-facing hint
//! and tells callers whether the failure is an expected outcome (validation,
//! authorization, lookup) or an unexpected fault.
//!
//! # Security
//!
//! Hints never include submitted values, password material, or store details.
//! `InvalidCredentials` is deliberately identical for an unknown email and a
//! wrong password.

use thiserror::Error;

/// Trait for marketplace error extensions
pub trait PlostErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is an expected, user-facing outcome
    ///
    /// Expected outcomes are reported back to the caller as structured
    /// results. Everything else is a fault that should be logged.
    fn is_expected(&self) -> bool;
}

/// Main marketplace error type
///
/// # Error Categories
///
/// - **Submission**: missing fields, overlong fields, bad icon, dead link
/// - **Credentials**: duplicate registration, failed login, wrong password
/// - **Authorization**: not logged in vs. logged in without the role
/// - **Lookup**: no such plugin vs. plugin hidden from this viewer
/// - **Faults**: store, configuration and IO failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{MarketError, PlostErrorExt};
///
/// let error = MarketError::MissingFields;
/// assert!(error.is_expected());
/// println!("Hint: {}", error.user_hint());
///
/// let fault = MarketError::Storage("disk full".to_string());
/// assert!(!fault.is_expected());
/// ```
#[derive(Debug, Error)]
pub enum MarketError {
    // Submission errors
    #[error("Missing required fields")]
    MissingFields,

    #[error("Field '{field}' exceeds {limit} characters")]
    FieldTooLong { field: &'static str, limit: usize },

    #[error("Invalid icon upload: {0}")]
    InvalidAsset(String),

    #[error("External URL unreachable: {0}")]
    UnreachableLink(String),

    // Credential errors
    #[error("Email already registered")]
    AlreadyRegistered,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Wrong current password")]
    WrongPassword,

    // Authorization errors
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    // Lookup errors
    #[error("Plugin {0} not found")]
    NotFound(i64),

    #[error("Plugin {0} not available")]
    NotAvailable(i64),

    // Faults
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::FieldTooLong { .. } => "field_too_long",
            Self::InvalidAsset(_) => "invalid_asset",
            Self::UnreachableLink(_) => "unreachable_link",
            Self::AlreadyRegistered => "already_registered",
            Self::InvalidCredentials => "invalid_credentials",
            Self::WrongPassword => "wrong_password",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::NotAvailable(_) => "not_available",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

impl PlostErrorExt for MarketError {
    fn user_hint(&self) -> &str {
        match self {
            // Submission errors
            Self::MissingFields => "Missing required fields.",
            Self::FieldTooLong { field, .. } if *field == "shortdesc" => {
                "Short description must be at most 180 characters."
            }
            Self::FieldTooLong { .. } => "One of the fields is too long.",
            Self::InvalidAsset(_) => "Icon must be a PNG or JPEG image of at most 300 KiB.",
            Self::UnreachableLink(_) => "External URL unreachable.",

            // Credential errors
            Self::AlreadyRegistered => "Email already registered.",
            Self::InvalidCredentials => "Invalid credentials.",
            Self::WrongPassword => "Wrong current password.",

            // Authorization errors
            Self::Unauthenticated => "Please log in to continue.",
            Self::Forbidden => "You do not have permission to do that.",

            // Lookup errors
            Self::NotFound(_) => "Not found.",
            Self::NotAvailable(_) => "Not available.",

            // Faults
            Self::Storage(_) => "Server error. Please try again later.",
            Self::Config(_) => "Check your config.toml file for errors.",
            Self::Io(_) => "File system operation failed.",
        }
    }

    fn is_expected(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Config(_) | Self::Io(_))
    }
}
