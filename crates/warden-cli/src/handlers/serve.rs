//! `warden serve`: run the web panel until Ctrl-C.

use anyhow::Result;
use tracing::{info, warn};
use warden_axum::start_server;

use crate::parser::ServeArgs;

pub async fn execute(args: &ServeArgs) -> Result<()> {
    let config = args.to_server_config();
    start_server(config, shutdown_signal()).await?;
    info!("warden stopped");
    Ok(())
}

/// Resolves on Ctrl-C; the server then stops the managed process and exits.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
    }
}
