//! Scriptable process doubles for supervisor and restart tests.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use warden_core::{
    InMemoryConfigStore, LaunchConfig, LaunchError, ProcessHandle, ProcessLauncher, ProcessSignal,
    ProcessState, SignalSender, StreamKind,
};

use crate::event_bus::EventBus;
use crate::supervisor::{LifecycleSupervisor, SupervisorOptions};
use crate::timings::SupervisorTimings;

pub const READY_LINE: &str = "[Server thread/INFO]: Done (3.2s)! For help, type \"help\"";

pub fn fast_timings() -> SupervisorTimings {
    SupervisorTimings {
        stop_timeout: Duration::from_millis(150),
        verify_shutdown_delay: Duration::from_millis(20),
        reinitialize_delay: Duration::from_millis(10),
        readiness_timeout: Duration::from_millis(300),
        readiness_poll: Duration::from_millis(5),
        final_confirmation_delay: Duration::from_millis(20),
    }
}

pub fn supervisor_with(launcher: Arc<FakeLauncher>) -> LifecycleSupervisor {
    supervisor_with_config(launcher, LaunchConfig::default().with_heap("1G", "2G"))
}

pub fn supervisor_with_config(
    launcher: Arc<FakeLauncher>,
    config: LaunchConfig,
) -> LifecycleSupervisor {
    LifecycleSupervisor::new(
        launcher,
        Arc::new(InMemoryConfigStore::new(config)),
        Arc::new(EventBus::new()),
        SupervisorOptions::default().with_timings(fast_timings()),
    )
}

/// Poll until the supervisor reaches `state`; panics after two seconds.
pub async fn wait_for_state(supervisor: &LifecycleSupervisor, state: ProcessState) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while supervisor.state() != state {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "timed out waiting for {state}, still {}",
        supervisor.state()
    );
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Launcher producing [`FakeProcess`]es.
#[derive(Default)]
pub struct FakeLauncher {
    fail_launch: AtomicBool,
    ignore_graceful: bool,
    ready_on_launch: bool,
    hang_writes: bool,
    attempts: AtomicUsize,
    processes: Mutex<Vec<Arc<FakeProcess>>>,
    last_config: Mutex<Option<LaunchConfig>>,
}

impl FakeLauncher {
    /// Every launch fails with a spawn error.
    pub fn failing(self) -> Self {
        self.fail_launch.store(true, Ordering::SeqCst);
        self
    }

    /// Processes ignore the graceful shutdown command.
    pub const fn ignoring_graceful(mut self) -> Self {
        self.ignore_graceful = true;
        self
    }

    /// Stdin writes block until the process exits, like a full pipe.
    pub const fn hanging_writes(mut self) -> Self {
        self.hang_writes = true;
        self
    }

    /// Processes print the ready line as soon as they are launched.
    pub const fn ready_on_launch(mut self) -> Self {
        self.ready_on_launch = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_launch.store(failing, Ordering::SeqCst);
    }

    pub fn launch_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Process of the given generation (1-based).
    pub fn process(&self, generation: u64) -> Arc<FakeProcess> {
        lock(&self.processes)
            .iter()
            .find(|p| p.generation == generation)
            .cloned()
            .unwrap_or_else(|| panic!("no process launched for generation {generation}"))
    }

    pub fn process_count(&self) -> usize {
        lock(&self.processes).len()
    }

    pub fn last_config(&self) -> Option<LaunchConfig> {
        lock(&self.last_config).clone()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(
        &self,
        config: &LaunchConfig,
        generation: u64,
        signals: SignalSender,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_config) = Some(config.clone());

        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(LaunchError::SpawnFailed(
                "simulated spawn failure".to_string(),
            ));
        }

        let process = Arc::new(FakeProcess {
            generation,
            signals,
            ignore_graceful: self.ignore_graceful,
            hang_writes: self.hang_writes,
            writes: Mutex::new(Vec::new()),
            kills: AtomicUsize::new(0),
            exited: AtomicBool::new(false),
        });
        if self.ready_on_launch {
            process.emit_line(READY_LINE);
        }
        lock(&self.processes).push(process.clone());

        Ok(Box::new(FakeHandle(process)))
    }
}

/// Test-side control of one fake process.
pub struct FakeProcess {
    pub generation: u64,
    signals: SignalSender,
    ignore_graceful: bool,
    hang_writes: bool,
    writes: Mutex<Vec<String>>,
    kills: AtomicUsize,
    exited: AtomicBool,
}

impl FakeProcess {
    fn signal(&self, signal: ProcessSignal) {
        if let Err(e) = self.signals.try_send(signal) {
            assert!(
                matches!(e, TrySendError::Closed(_)),
                "signal channel full in test"
            );
        }
    }

    pub fn emit(&self, stream: StreamKind, text: &str) {
        self.signal(ProcessSignal::line(self.generation, stream, text));
    }

    pub fn emit_line(&self, text: &str) {
        self.emit(StreamKind::Stdout, text);
    }

    /// Report exit; only the first call has an effect.
    pub fn exit(&self, code: Option<i32>) {
        if !self.exited.swap(true, Ordering::SeqCst) {
            self.signal(ProcessSignal::exited(self.generation, code));
        }
    }

    /// Report a handle error followed by the exit it causes.
    pub fn fail(&self, message: &str) {
        self.signal(ProcessSignal::error(self.generation, message));
        self.exit(None);
    }

    /// Lines written to stdin, in order.
    pub fn writes(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

struct FakeHandle(Arc<FakeProcess>);

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        u32::try_from(40_000 + self.0.generation).ok()
    }

    async fn write_line(&self, text: &str) -> io::Result<()> {
        if self.0.hang_writes {
            while !self.0.exited.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        if self.0.exited.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "process exited"));
        }
        lock(&self.0.writes).push(text.to_string());
        Ok(())
    }

    async fn terminate_gracefully(&self) -> io::Result<()> {
        self.write_line("stop").await?;
        if !self.0.ignore_graceful {
            self.0.exit(Some(0));
        }
        Ok(())
    }

    fn terminate_forcibly(&self) {
        self.0.kills.fetch_add(1, Ordering::SeqCst);
        self.0.exit(None);
    }
}
