//! Launch configuration for the managed process.
//!
//! A `LaunchConfig` is read once per `start()` and never mutated by the
//! supervisor. Persistence is owned by a `ConfigStore` implementation.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Fixed JVM tuning flag set applied when `use_optimized_flags` is enabled.
pub const OPTIMIZED_FLAGS: &[&str] = &[
    "-XX:+UseG1GC",
    "-XX:+ParallelRefProcEnabled",
    "-XX:MaxGCPauseMillis=200",
    "-XX:+UnlockExperimentalVMOptions",
    "-XX:+DisableExplicitGC",
    "-XX:+AlwaysPreTouch",
    "-XX:G1NewSizePercent=30",
    "-XX:G1MaxNewSizePercent=40",
    "-XX:G1HeapRegionSize=8M",
    "-XX:G1ReservePercent=20",
    "-XX:G1HeapWastePercent=5",
    "-XX:G1MixedGCCountTarget=4",
    "-XX:InitiatingHeapOccupancyPercent=15",
    "-XX:G1MixedGCLiveThresholdPercent=90",
    "-XX:G1RSetUpdatingPauseTimePercent=5",
    "-XX:SurvivorRatio=32",
    "-XX:+PerfDisableSharedMem",
    "-XX:MaxTenuringThreshold=1",
];

/// Flag telling the server not to open its own GUI window.
pub const HEADLESS_FLAG: &str = "nogui";

/// Launch parameters for the managed process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchConfig {
    /// Initial heap size (e.g. `1G`, `512M`).
    pub min_heap: String,
    /// Maximum heap size (e.g. `2G`).
    pub max_heap: String,
    /// Append the fixed optimisation flag set.
    pub use_optimized_flags: bool,
    /// Directory the process is launched in; the entry artifact lives here.
    pub working_directory: PathBuf,
    /// File name of the artifact to run, relative to `working_directory`.
    pub entry_artifact: String,
    /// Interpreter used to run the artifact.
    pub java_path: String,
    /// Additional flags placed after the heap/optimisation flags.
    pub extra_args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            min_heap: "1G".to_string(),
            max_heap: "2G".to_string(),
            use_optimized_flags: true,
            working_directory: PathBuf::from("."),
            entry_artifact: "server.jar".to_string(),
            java_path: "java".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// Set the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Set the heap bounds.
    #[must_use]
    pub fn with_heap(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_heap = min.into();
        self.max_heap = max.into();
        self
    }

    /// Full path of the entry artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.working_directory.join(&self.entry_artifact)
    }

    /// Argument vector passed to the interpreter.
    ///
    /// Order: heap flags, optimisation flags, extra flags, `-jar <artifact>`,
    /// headless flag.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![format!("-Xms{}", self.min_heap), format!("-Xmx{}", self.max_heap)];

        if self.use_optimized_flags {
            args.extend(OPTIMIZED_FLAGS.iter().map(|f| (*f).to_string()));
        }

        args.extend(self.extra_args.iter().cloned());
        args.push("-jar".to_string());
        args.push(self.entry_artifact.clone());
        args.push(HEADLESS_FLAG.to_string());
        args
    }

    /// Validate field syntax. Does not touch the filesystem.
    pub fn validate(&self) -> Result<(), LaunchConfigError> {
        let min = parse_heap_size(&self.min_heap)
            .ok_or_else(|| LaunchConfigError::InvalidHeapSize(self.min_heap.clone()))?;
        let max = parse_heap_size(&self.max_heap)
            .ok_or_else(|| LaunchConfigError::InvalidHeapSize(self.max_heap.clone()))?;

        if min > max {
            return Err(LaunchConfigError::HeapOrder {
                min: self.min_heap.clone(),
                max: self.max_heap.clone(),
            });
        }

        let artifact = self.entry_artifact.trim();
        if artifact.is_empty() {
            return Err(LaunchConfigError::EmptyArtifact);
        }
        let mut components = Path::new(artifact).components();
        let single_name = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();
        if !single_name || artifact.contains(['/', '\\']) {
            return Err(LaunchConfigError::ArtifactNotAFileName(
                self.entry_artifact.clone(),
            ));
        }

        if self.java_path.trim().is_empty() {
            return Err(LaunchConfigError::EmptyInterpreter);
        }

        Ok(())
    }
}

/// Parse a JVM heap size (`<digits>[K|M|G]`, case-insensitive) into bytes.
///
/// Returns `None` for malformed or zero values.
pub fn parse_heap_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last()? {
        'k' | 'K' => (&value[..value.len() - 1], 1024),
        'm' | 'M' => (&value[..value.len() - 1], 1024 * 1024),
        'g' | 'G' => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        c if c.is_ascii_digit() => (value, 1),
        _ => return None,
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let bytes = digits.parse::<u64>().ok()?.checked_mul(multiplier)?;
    (bytes > 0).then_some(bytes)
}

/// Launch configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchConfigError {
    #[error("Invalid heap size '{0}' (expected e.g. 512M or 2G)")]
    InvalidHeapSize(String),

    #[error("Minimum heap {min} exceeds maximum heap {max}")]
    HeapOrder { min: String, max: String },

    #[error("Entry artifact cannot be empty")]
    EmptyArtifact,

    #[error("Entry artifact must be a file name inside the working directory, got '{0}'")]
    ArtifactNotAFileName(String),

    #[error("Interpreter path cannot be empty")]
    EmptyInterpreter,
}
