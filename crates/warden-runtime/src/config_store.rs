//! File-backed launch configuration store.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::{ConfigError, ConfigStore, LaunchConfig};

/// Persists [`LaunchConfig`] as pretty-printed JSON.
///
/// A missing file loads as the default configuration. Saves write a
/// uniquely named sibling temp file and rename it into place, so concurrent
/// saves never share a temp file and the last rename wins.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<LaunchConfig, ConfigError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No launch config on disk, using defaults");
                Ok(LaunchConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, config: &LaunchConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(config)?;
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        let written = match tokio::fs::write(&tmp, json).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp config file");
            }
            return Err(e.into());
        }

        info!(path = %self.path.display(), "Launch config saved");
        Ok(())
    }
}
