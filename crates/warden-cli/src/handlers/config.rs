//! `warden config`: print the saved launch configuration.

use std::path::PathBuf;

use anyhow::Result;
use warden_core::{ConfigStore, default_launch_config_path};
use warden_runtime::JsonConfigStore;

pub async fn execute(path: Option<PathBuf>) -> Result<()> {
    let store = JsonConfigStore::new(path.unwrap_or_else(default_launch_config_path));
    let config = store.load().await?;

    println!("# {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!();
    println!("Command line: {} {}", config.java_path, config.build_args().join(" "));
    Ok(())
}
