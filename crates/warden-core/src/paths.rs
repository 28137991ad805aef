//! Canonical data locations.
//!
//! Resolution only; directory creation belongs to the adapters that write
//! into these locations.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "WARDEN_DATA_DIR";

const APP_DIR: &str = "warden";
const LAUNCH_CONFIG_FILE: &str = "launch.json";

/// Root directory for panel data.
///
/// Resolution order:
/// 1. `WARDEN_DATA_DIR` environment variable
/// 2. System data directory (e.g. `~/.local/share/warden`)
/// 3. `./.warden` when no system data directory is known
pub fn data_root() -> PathBuf {
    if let Some(path) = env::var_os(DATA_DIR_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    dirs::data_dir().map_or_else(|| PathBuf::from(".warden"), |dir| dir.join(APP_DIR))
}

/// Default location of the persisted launch configuration.
pub fn default_launch_config_path() -> PathBuf {
    data_root().join(LAUNCH_CONFIG_FILE)
}
