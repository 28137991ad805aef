//! Launch configuration persistence port.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::LaunchConfig;
use crate::error::ConfigError;

/// Load/save pair for the persisted [`LaunchConfig`].
///
/// The supervisor only ever calls [`ConfigStore::load`], once per start.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<LaunchConfig, ConfigError>;

    /// Persist `config`. Implementations validate before writing.
    async fn save(&self, config: &LaunchConfig) -> Result<(), ConfigError>;
}

/// Non-persistent store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    config: Mutex<LaunchConfig>,
}

impl InMemoryConfigStore {
    pub fn new(config: LaunchConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load(&self) -> Result<LaunchConfig, ConfigError> {
        Ok(self
            .config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, config: &LaunchConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(())
    }
}
