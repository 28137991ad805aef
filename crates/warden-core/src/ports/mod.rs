//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the lifecycle core expects from
//! infrastructure. They use only domain types; implementations live in
//! `warden-runtime`.

mod config_store;
mod metrics;
mod process;
mod readiness;

pub use config_store::{ConfigStore, InMemoryConfigStore};
pub use metrics::MetricsSource;
pub use process::{
    ProcessHandle, ProcessLauncher, ProcessSignal, SIGNAL_CHANNEL_CAPACITY, SignalKind, SignalSender,
};
pub use readiness::{BannerReadiness, ReadinessProbe};
