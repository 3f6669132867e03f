//! Roles, plugin status and the request principal

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A role or status name that is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseNameError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Account role
///
/// New accounts always start as `User`. Elevation happens out of band
/// (operator CLI), never through a user-facing operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Whether this role carries governance authority over plugins
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(ParseNameError::new("role", other)),
        }
    }
}

/// Plugin lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Pending,
    Approved,
    Rejected,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Pending => "pending",
            PluginStatus::Approved => "approved",
            PluginStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginStatus {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PluginStatus::Pending),
            "approved" => Ok(PluginStatus::Approved),
            "rejected" => Ok(PluginStatus::Rejected),
            other => Err(ParseNameError::new("plugin status", other)),
        }
    }
}

/// The authenticated identity attached to a single request
///
/// Passed explicitly into every operation that needs authorization context.
/// An anonymous request is represented as `Option<Principal>::None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub name: Option<String>,
}

impl Principal {
    pub fn new(id: i64, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            role,
            name: None,
        }
    }
}
