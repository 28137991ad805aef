//! Core domain types and port definitions for the warden control panel.
//!
//! This crate is pure: it owns the process state model, launch configuration,
//! the event union streamed to clients, the error taxonomy, and the traits
//! (ports) that runtime adapters implement. It contains no process, network
//! or filesystem-mutating code.

#![deny(unsafe_code)]

pub mod domain;
pub mod error;
pub mod events;
pub mod paths;
pub mod ports;

pub use domain::{
    HEADLESS_FLAG, LaunchConfig, LaunchConfigError, OPTIMIZED_FLAGS, ProcessState, RestartSessionInfo,
    RestartStage, StatusSnapshot, parse_heap_size,
};
pub use error::{ConfigError, ErrorKind, LaunchError, SamplingError, SupervisorError};
pub use events::{OutputEvent, PanelEvent, ProcessUsage, StreamKind, TelemetrySnapshot};
pub use paths::{data_root, default_launch_config_path};
pub use ports::{
    BannerReadiness, ConfigStore, InMemoryConfigStore, MetricsSource, ProcessHandle,
    ProcessLauncher, ProcessSignal, ReadinessProbe, SIGNAL_CHANNEL_CAPACITY, SignalKind,
    SignalSender,
};
