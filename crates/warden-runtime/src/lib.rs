//! Process supervision runtime for warden.
//!
//! Owns everything with concurrency or OS concerns: the lifecycle state
//! machine, the staged restart protocol, event fan-out to subscribers, the
//! child-process adapter, telemetry sampling and the file-backed launch
//! configuration store.

#![deny(unsafe_code)]

pub mod config_store;
pub mod event_bus;
pub mod process;
mod restart;
pub mod supervisor;
pub mod telemetry;
mod timings;

#[cfg(test)]
mod testing;

pub use config_store::JsonConfigStore;
pub use event_bus::{CONSOLE_HISTORY_LINES, EventBus, Subscription};
pub use process::ChildProcessLauncher;
pub use supervisor::{CommandOutcome, LifecycleSupervisor, SupervisorOptions};
pub use telemetry::{SysinfoMetricsSource, TelemetryPoller};
pub use timings::SupervisorTimings;
