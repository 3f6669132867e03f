//! Plost SDK
//!
//! Shared vocabulary for the Plost marketplace: roles, plugin lifecycle
//! status, the request principal, and the error taxonomy.
//! This crate is used by the engine and by anything that talks to it.

/// Error types and handling
pub mod errors;

/// Domain types shared across components
pub mod types;

// Re-export commonly used types
pub use errors::{MarketError, PlostErrorExt};
pub use types::{ParseNameError, PluginStatus, Principal, Role};
