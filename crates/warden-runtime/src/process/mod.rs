//! OS process adapter.
//!
//! [`ChildProcessLauncher`] spawns the managed server with `tokio::process`
//! and reports its output and exit through the supervisor's signal channel.

mod child;
mod stream;

pub use child::{ChildProcessLauncher, DEFAULT_SHUTDOWN_COMMAND};
