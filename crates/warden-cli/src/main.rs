//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use warden_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before parsing so `.env` can supply flags
    dotenvy::dotenv().ok();

    let Cli {
        verbose,
        serve,
        command,
    } = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match command.unwrap_or(Commands::Serve(serve)) {
        Commands::Serve(args) => handlers::serve::execute(&args).await?,
        Commands::Paths => handlers::paths::execute(),
        Commands::Config { config } => handlers::config::execute(config).await?,
    }

    Ok(())
}
