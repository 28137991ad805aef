//! Periodic host telemetry.
//!
//! The poller samples on a fixed interval that is independent of client
//! requests, publishes each snapshot on the event bus and keeps the latest
//! one for on-demand reads. Sampling failures are logged and skipped.

use std::time::Duration;

use chrono::Utc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_core::{
    MetricsSource, PanelEvent, ProcessUsage, SamplingError, TelemetrySnapshot,
};

use crate::supervisor::LifecycleSupervisor;

/// `sysinfo`-backed [`MetricsSource`].
pub struct SysinfoMetricsSource {
    system: System,
}

impl SysinfoMetricsSource {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta; prime the first measurement.
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SysinfoMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SysinfoMetricsSource {
    fn sample(&mut self, pid: Option<u32>) -> Result<TelemetrySnapshot, SamplingError> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let memory_total_bytes = self.system.total_memory();
        if memory_total_bytes == 0 {
            return Err(SamplingError("host memory information unavailable".to_string()));
        }

        let process = pid.and_then(|pid| {
            let pid = Pid::from_u32(pid);
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            self.system.process(pid).map(|p| ProcessUsage {
                pid: pid.as_u32(),
                cpu_percent: p.cpu_usage(),
                memory_bytes: p.memory(),
            })
        });

        Ok(TelemetrySnapshot {
            cpu_percent: self.system.global_cpu_usage(),
            memory_used_bytes: self.system.used_memory(),
            memory_total_bytes,
            process,
            timestamp: Utc::now(),
        })
    }
}

/// Fixed-interval sampler feeding the event bus.
pub struct TelemetryPoller {
    supervisor: LifecycleSupervisor,
    source: Box<dyn MetricsSource>,
    interval: Duration,
    latest: watch::Sender<Option<TelemetrySnapshot>>,
}

impl TelemetryPoller {
    pub fn new(
        supervisor: LifecycleSupervisor,
        source: Box<dyn MetricsSource>,
        interval: Duration,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            supervisor,
            source,
            interval: interval.max(Duration::from_millis(1)),
            latest,
        }
    }

    /// Receiver that always holds the most recent successful sample.
    pub fn latest(&self) -> watch::Receiver<Option<TelemetrySnapshot>> {
        self.latest.subscribe()
    }

    /// Run on a background task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_ms = self.interval.as_millis(), "Telemetry poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_once(),
                () = cancel.cancelled() => break,
            }
        }

        debug!("Telemetry poller stopped");
    }

    fn poll_once(&mut self) {
        let pid = self.supervisor.pid();
        match self.source.sample(pid) {
            Ok(snapshot) => {
                self.latest.send_replace(Some(snapshot.clone()));
                self.supervisor
                    .events()
                    .publish(PanelEvent::Telemetry(snapshot));
            }
            Err(e) => warn!(error = %e, "Telemetry sample failed, skipping"),
        }
    }
}
