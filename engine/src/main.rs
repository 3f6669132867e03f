// Plost plugin marketplace
// Main entry point for the plost binary

use clap::Parser;
use plost_engine::cli::{Cli, Command};
use plost_engine::config::Config;
use plost_engine::handlers::{
    handle_queue, handle_seed, handle_serve, handle_set_role, OutputFormat,
};
use plost_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    if let Some(level) = cli.log {
        config.core.log_level = level;
    }
    init_telemetry_with_level(&config.core.log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Plost v{} ({} - {})", version, commit, timestamp);

    // Handle commands
    match cli.command {
        Command::Serve { port } => {
            tracing::info!("Starting server...");
            handle_serve(&config, port).await
        }

        Command::Seed => {
            tracing::info!("Seeding demo data...");
            handle_seed(&config, format).await
        }

        Command::SetRole { email, role } => {
            tracing::info!("Assigning role {} to {}", role, email);
            handle_set_role(&config, &email, role, format).await
        }

        Command::Queue => handle_queue(&config, format).await,
    }
}
