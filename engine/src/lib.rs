//! Plost Engine Library
//!
//! This library provides the core functionality of the Plost marketplace.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Credential store and sessions
pub mod auth;

/// Visibility and moderation workflow
pub mod moderation;

/// Submission validation and icon storage
pub mod submission;

/// Browsing queries
pub mod catalog;

/// Markdown rendering
pub mod render;

/// HTTP adapter
pub mod api;

/// Demo data
pub mod seed;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
