//! Main CLI parser and top-level argument handling.
//!
//! Running `warden` without a subcommand serves the panel, so the serve
//! flags are accepted at the top level as well as under `warden serve`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use warden_axum::{CorsConfig, ServerConfig};
use warden_core::default_launch_config_path;
use warden_runtime::SupervisorTimings;

/// Web control panel for a long-running game server process.
#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Supervise a game server and control it from the browser")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web panel (default)
    Serve(ServeArgs),

    /// Show where warden keeps its data
    Paths,

    /// Print the saved launch configuration
    Config {
        /// Launch configuration file
        #[arg(long, env = "WARDEN_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Options for serving the panel.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// HTTP port for the panel
    #[arg(short, long, env = "WARDEN_PORT", default_value_t = 8420)]
    pub port: u16,

    /// Directory containing the server artifact; saved as the working directory
    #[arg(long, env = "WARDEN_SERVER_DIR")]
    pub server_dir: Option<PathBuf>,

    /// Launch configuration file
    #[arg(long, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve a built frontend from this directory
    #[arg(long, env = "WARDEN_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Comma-separated CORS origins (all origins allowed when empty)
    #[arg(long, env = "WARDEN_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Seconds between telemetry samples
    #[arg(long, env = "WARDEN_TELEMETRY_INTERVAL_SECS", default_value_t = 2,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub telemetry_interval_secs: u64,

    /// Seconds a graceful stop may take before the server is force-killed
    #[arg(long, env = "WARDEN_STOP_TIMEOUT_SECS", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub stop_timeout_secs: u64,
}

impl ServeArgs {
    /// Assemble the web adapter configuration.
    pub fn to_server_config(&self) -> ServerConfig {
        let cors = if self.allowed_origins.is_empty() {
            CorsConfig::AllowAll
        } else {
            CorsConfig::AllowOrigins(self.allowed_origins.clone())
        };

        ServerConfig {
            port: self.port,
            launch_config_path: self
                .config
                .clone()
                .unwrap_or_else(default_launch_config_path),
            server_dir: self.server_dir.clone(),
            static_dir: self.static_dir.clone(),
            cors,
            telemetry_interval: Duration::from_secs(self.telemetry_interval_secs),
            timings: SupervisorTimings::default()
                .with_stop_timeout(Duration::from_secs(self.stop_timeout_secs)),
        }
    }
}
