//! CLI interface for Plost
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for running and administering
//! the marketplace.

use clap::{Parser, Subcommand};
use sdk::types::Role;
use std::path::PathBuf;

/// Plost plugin marketplace
///
/// Serves the marketplace over HTTP and provides operator tooling for
/// seeding demo data, assigning roles and inspecting the moderation queue.
#[derive(Parser, Debug)]
#[command(name = "plost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server until Ctrl-C
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Insert demo accounts and plugins if they are missing
    Seed,

    /// Assign a role to an account
    SetRole {
        /// Account email
        email: String,

        /// New role (user, moderator, admin)
        role: Role,
    },

    /// Show the moderation queue, oldest first
    Queue,
}
