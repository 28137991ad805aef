//! Domain types for the managed process lifecycle.

mod launch;
mod restart;
mod state;

pub use launch::{HEADLESS_FLAG, LaunchConfig, LaunchConfigError, OPTIMIZED_FLAGS, parse_heap_size};
pub use restart::{RestartSessionInfo, RestartStage};
pub use state::{ProcessState, StatusSnapshot};
