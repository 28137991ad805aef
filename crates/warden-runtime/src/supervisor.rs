//! Lifecycle supervisor for the managed process.
//!
//! The supervisor is the only writer of [`ProcessState`]. All transitions
//! happen while holding one async mutex over the state and the attached
//! handle, and every transition is published on the [`EventBus`] before the
//! lock is released, so observers never see a half-applied change.
//!
//! Writes to the process's stdin can block on a full pipe, so they are made
//! on a cloned handle after the lock is released. Kill and exit handling
//! never wait behind a stuck write.
//!
//! Each launch gets a fresh generation number. Output, errors and exits
//! reported by a handle carry the generation they belong to; signals and
//! force-kill timers from a superseded generation are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::{
    BannerReadiness, ConfigStore, LaunchConfig, OutputEvent, PanelEvent,
    ConfigError, ProcessHandle, ProcessLauncher, ProcessSignal, ProcessState, ReadinessProbe,
    RestartSessionInfo, SIGNAL_CHANNEL_CAPACITY, SignalKind, SignalSender, StatusSnapshot,
    StreamKind, SupervisorError,
};

use crate::event_bus::{EventBus, Subscription};
use crate::timings::SupervisorTimings;

/// Tunables for a [`LifecycleSupervisor`].
#[derive(Clone)]
pub struct SupervisorOptions {
    pub timings: SupervisorTimings,
    /// Decides when a `starting` process becomes `running`.
    pub readiness: Arc<dyn ReadinessProbe>,
}

impl SupervisorOptions {
    #[must_use]
    pub const fn with_timings(mut self, timings: SupervisorTimings) -> Self {
        self.timings = timings;
        self
    }

    #[must_use]
    pub fn with_readiness(mut self, readiness: Arc<dyn ReadinessProbe>) -> Self {
        self.readiness = readiness;
        self
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            timings: SupervisorTimings::default(),
            readiness: Arc::new(BannerReadiness::default()),
        }
    }
}

/// Result of [`LifecycleSupervisor::send_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the command was written to the process's stdin.
    pub delivered: bool,
}

/// Lock-free view of the supervisor used by pollers and waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Observed {
    pub(crate) state: ProcessState,
    pub(crate) generation: u64,
    pub(crate) pid: Option<u32>,
}

struct Attached {
    generation: u64,
    handle: Arc<dyn ProcessHandle>,
    started_at: DateTime<Utc>,
    stop_timer: Option<CancellationToken>,
}

pub(crate) struct Inner {
    state: ProcessState,
    attached: Option<Attached>,
    /// Generation of the most recent launch attempt.
    generation: u64,
    pub(crate) session: Option<RestartSessionInfo>,
}

impl Inner {
    /// Drop the restart session if it is still the one identified.
    pub(crate) fn clear_session(&mut self, session_id: Uuid) {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.session_id == session_id)
        {
            warn!(%session_id, "Restart abandoned before reporting an outcome");
            self.session = None;
        }
    }
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) bus: Arc<EventBus>,
    launcher: Arc<dyn ProcessLauncher>,
    config_store: Arc<dyn ConfigStore>,
    pub(crate) options: SupervisorOptions,
    signal_tx: SignalSender,
    observed: watch::Sender<Observed>,
    pub(crate) restart_active: AtomicBool,
    pub(crate) restart_aborted: AtomicBool,
}

/// Owns the managed process and sequences start/stop/restart/kill.
///
/// Cheap to clone; clones share the same process and state.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(EventBus::new());
/// let supervisor = LifecycleSupervisor::new(launcher, store, bus, SupervisorOptions::default());
/// supervisor.start().await?;
/// supervisor.send_command("say hello").await;
/// supervisor.stop().await?;
/// ```
#[derive(Clone)]
pub struct LifecycleSupervisor {
    pub(crate) shared: Arc<Shared>,
}

impl LifecycleSupervisor {
    /// Create a supervisor in the `stopped` state.
    ///
    /// Must be called from within a Tokio runtime: it spawns the task that
    /// consumes process signals.
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        config_store: Arc<dyn ConfigStore>,
        bus: Arc<EventBus>,
        options: SupervisorOptions,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (observed, _) = watch::channel(Observed {
            state: ProcessState::Stopped,
            generation: 0,
            pid: None,
        });

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: ProcessState::Stopped,
                attached: None,
                generation: 0,
                session: None,
            }),
            bus,
            launcher,
            config_store,
            options,
            signal_tx,
            observed,
            restart_active: AtomicBool::new(false),
            restart_aborted: AtomicBool::new(false),
        });

        tokio::spawn(pump_signals(Arc::downgrade(&shared), signal_rx));

        Self { shared }
    }

    /// Launch the process using the currently saved launch configuration.
    ///
    /// Returns the generation assigned to the new process. The state is
    /// `starting` on return; `running` follows once the ready signature is
    /// seen on stdout.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` unless the state is `stopped`, `RestartInProgress`
    /// during a restart, `Config`/`Launch` when the configuration cannot be
    /// loaded or the process cannot be spawned (the latter leaves `error`).
    pub async fn start(&self) -> Result<u64, SupervisorError> {
        self.ensure_no_restart()?;
        self.shared.start_process().await
    }

    /// Ask the process to shut down and return once the request is accepted.
    ///
    /// The graceful shutdown command is written immediately and a force-kill
    /// timer is armed; the exit itself is observed later on the event bus.
    /// From `error`, clears the state to `stopped`.
    ///
    /// # Errors
    ///
    /// `AlreadyStopped` when nothing is running, `RestartInProgress` during
    /// a restart.
    pub async fn request_stop(&self) -> Result<(), SupervisorError> {
        self.ensure_no_restart()?;
        self.shared.request_stop_process().await.map(|_| ())
    }

    /// Stop the process and wait until it has actually exited.
    ///
    /// A process that ignores the graceful command is force-killed after
    /// the stop budget; that escalation is not an error.
    ///
    /// # Errors
    ///
    /// Same as [`request_stop`](Self::request_stop).
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.ensure_no_restart()?;
        self.shared.stop_and_wait().await
    }

    /// Force-kill the process, if any, and enter `stopped`. Never fails.
    ///
    /// Killing during a restart aborts the restart at its next checkpoint.
    pub async fn kill(&self) {
        self.shared.kill_process().await;
    }

    /// Forward a console command to the process.
    ///
    /// The command is always echoed to subscribers; it is only written to
    /// the process while `running`.
    pub async fn send_command(&self, text: &str) -> CommandOutcome {
        self.shared.send_command(text).await
    }

    /// Point-in-time status.
    pub async fn status(&self) -> StatusSnapshot {
        let inner = self.shared.inner.lock().await;
        let attached = inner.attached.as_ref();
        let started_at = attached.map(|a| a.started_at);

        StatusSnapshot {
            state: inner.state,
            pid: attached.and_then(|a| a.handle.pid()),
            generation: inner.generation,
            started_at,
            uptime_secs: started_at
                .map(|at| u64::try_from((Utc::now() - at).num_seconds()).unwrap_or(0)),
            restart: inner.session.clone(),
        }
    }

    /// Current state without taking the supervisor lock.
    pub fn state(&self) -> ProcessState {
        self.shared.observed().state
    }

    /// OS pid of the attached process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.shared.observed().pid
    }

    /// Subscribe to lifecycle, console and telemetry events.
    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    pub fn timings(&self) -> SupervisorTimings {
        self.shared.options.timings
    }

    fn ensure_no_restart(&self) -> Result<(), SupervisorError> {
        if self.shared.restart_active.load(Ordering::SeqCst) {
            return Err(SupervisorError::RestartInProgress);
        }
        Ok(())
    }
}

async fn pump_signals(shared: Weak<Shared>, mut signals: mpsc::Receiver<ProcessSignal>) {
    while let Some(signal) = signals.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_signal(signal).await;
    }
    debug!("Process signal pump exiting");
}

impl Shared {
    pub(crate) fn observed(&self) -> Observed {
        *self.observed.borrow()
    }

    fn sync_observed(&self, inner: &Inner) {
        self.observed.send_replace(Observed {
            state: inner.state,
            generation: inner.generation,
            pid: inner.attached.as_ref().and_then(|a| a.handle.pid()),
        });
    }

    /// Commit `next` and publish it. Must be called with the lock held.
    pub(crate) fn transition(&self, inner: &mut Inner, next: ProcessState) {
        let previous = inner.state;
        inner.state = next;
        self.sync_observed(inner);

        if previous != next {
            info!(%previous, state = %next, generation = inner.generation, "Lifecycle transition");
            self.bus.publish(PanelEvent::state_changed(next, previous));
        }
    }

    /// Kill and release the attached handle. Returns whether one was attached.
    pub(crate) fn force_detach(&self, inner: &mut Inner) -> bool {
        let Some(attached) = inner.attached.take() else {
            return false;
        };

        if let Some(timer) = attached.stop_timer {
            timer.cancel();
        }
        info!(
            generation = attached.generation,
            pid = ?attached.handle.pid(),
            "Force-killing process"
        );
        attached.handle.terminate_forcibly();
        self.sync_observed(inner);
        true
    }

    async fn load_launch_config(&self) -> Result<LaunchConfig, SupervisorError> {
        let config = self.config_store.load().await?;
        config.validate().map_err(ConfigError::from)?;
        Ok(config)
    }

    pub(crate) async fn start_process(&self) -> Result<u64, SupervisorError> {
        let mut inner = self.inner.lock().await;
        if !inner.state.can_start() {
            return Err(SupervisorError::AlreadyRunning(inner.state));
        }

        let config = match self.load_launch_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Refusing to start with unusable launch config");
                self.bus
                    .publish_line(OutputEvent::error(format!("Cannot start server: {e}")));
                return Err(e);
            }
        };

        inner.generation += 1;
        let generation = inner.generation;
        self.transition(&mut inner, ProcessState::Starting);
        self.bus.publish_line(OutputEvent::system(format!(
            "Starting server: {} {}",
            config.java_path,
            config.build_args().join(" ")
        )));

        match self
            .launcher
            .launch(&config, generation, self.signal_tx.clone())
            .await
        {
            Ok(handle) => {
                let pid = handle.pid();
                info!(generation, ?pid, "Process launched");
                inner.attached = Some(Attached {
                    generation,
                    handle: Arc::from(handle),
                    started_at: Utc::now(),
                    stop_timer: None,
                });
                self.sync_observed(&inner);
                Ok(generation)
            }
            Err(e) => {
                warn!(generation, error = %e, "Launch failed");
                self.bus
                    .publish_line(OutputEvent::error(format!("Failed to start server: {e}")));
                self.transition(&mut inner, ProcessState::Error);
                Err(e.into())
            }
        }
    }

    /// Returns the generation the stop applies to.
    pub(crate) async fn request_stop_process(self: &Arc<Self>) -> Result<u64, SupervisorError> {
        let (generation, handle) = {
            let mut inner = self.inner.lock().await;
            let generation = inner.generation;

            match inner.state {
                ProcessState::Stopped => return Err(SupervisorError::AlreadyStopped),
                ProcessState::Error => {
                    self.bus
                        .publish_line(OutputEvent::system("Cleared error state"));
                    self.transition(&mut inner, ProcessState::Stopped);
                    return Ok(generation);
                }
                ProcessState::Stopping => return Ok(generation),
                ProcessState::Starting | ProcessState::Running => {}
            }

            self.transition(&mut inner, ProcessState::Stopping);
            self.bus.publish_line(OutputEvent::system("Stopping server..."));

            let Some(attached) = inner.attached.as_mut() else {
                self.transition(&mut inner, ProcessState::Stopped);
                return Ok(generation);
            };

            // The budget also covers a shutdown write that never completes.
            let timer = CancellationToken::new();
            attached.stop_timer = Some(timer.clone());
            let handle = Arc::clone(&attached.handle);
            self.arm_stop_timer(generation, timer);
            (generation, handle)
        };

        if let Err(e) = handle.terminate_gracefully().await {
            let mut inner = self.inner.lock().await;
            let current = inner.state == ProcessState::Stopping
                && inner
                    .attached
                    .as_ref()
                    .is_some_and(|a| a.generation == generation);
            if !current {
                debug!(generation, error = %e, "Shutdown write failed after process was released");
                return Ok(generation);
            }

            warn!(generation, error = %e, "Graceful shutdown failed, forcing");
            self.bus.publish_line(OutputEvent::warning(format!(
                "Graceful shutdown failed ({e}), killing server"
            )));
            self.force_detach(&mut inner);
            self.transition(&mut inner, ProcessState::Stopped);
        }

        Ok(generation)
    }

    fn arm_stop_timer(self: &Arc<Self>, generation: u64, timer: CancellationToken) {
        let budget = self.options.timings.stop_timeout;
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                () = timer.cancelled() => {}
                () = tokio::time::sleep(budget) => {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_stop_timeout(generation).await;
                    }
                }
            }
        });
        debug!(generation, budget_ms = budget.as_millis(), "Force-kill timer armed");
    }

    pub(crate) async fn stop_and_wait(self: &Arc<Self>) -> Result<(), SupervisorError> {
        let mut observed = self.observed.subscribe();
        let generation = self.request_stop_process().await?;

        observed
            .wait_for(|o| o.generation != generation || !o.state.is_active())
            .await
            .map(|_| ())
            .map_err(|_| SupervisorError::Timeout("supervisor shut down during stop".to_string()))
    }

    async fn on_stop_timeout(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        let armed = inner.state == ProcessState::Stopping
            && inner
                .attached
                .as_ref()
                .is_some_and(|a| a.generation == generation);
        if !armed {
            debug!(generation, "Stale force-kill timer ignored");
            return;
        }

        let budget = self.options.timings.stop_timeout;
        warn!(generation, budget_ms = budget.as_millis(), "Process ignored shutdown, forcing");
        self.bus.publish_line(OutputEvent::warning(format!(
            "Server did not stop within {:.1}s, killing it",
            budget.as_secs_f32()
        )));
        self.force_detach(&mut inner);
        self.transition(&mut inner, ProcessState::Stopped);
    }

    pub(crate) async fn kill_process(&self) {
        let mut inner = self.inner.lock().await;
        if self.restart_active.load(Ordering::SeqCst) {
            self.restart_aborted.store(true, Ordering::SeqCst);
        }

        if self.force_detach(&mut inner) {
            self.bus.publish_line(OutputEvent::system("Server killed"));
        } else if inner.state == ProcessState::Stopped {
            debug!("Kill requested with no process attached");
            return;
        }
        self.transition(&mut inner, ProcessState::Stopped);
    }

    async fn send_command(&self, text: &str) -> CommandOutcome {
        let command = text.trim_end_matches(['\r', '\n']);
        let (generation, handle) = {
            let inner = self.inner.lock().await;
            self.bus.publish_line(OutputEvent::command(command));

            match (inner.state, inner.attached.as_ref()) {
                (ProcessState::Running, Some(attached)) => {
                    (attached.generation, Arc::clone(&attached.handle))
                }
                (state, _) => {
                    debug!(%state, "Command dropped, server not running");
                    return CommandOutcome { delivered: false };
                }
            }
        };

        match handle.write_line(command).await {
            Ok(()) => {
                debug!(generation, "Command forwarded");
                CommandOutcome { delivered: true }
            }
            Err(e) => {
                let observed = self.observed();
                if observed.generation == generation && observed.state.is_active() {
                    warn!(generation, error = %e, "Failed to write command");
                    self.bus
                        .publish_line(OutputEvent::warning(format!("Failed to send command: {e}")));
                } else {
                    debug!(generation, error = %e, "Command write ended with the process");
                }
                CommandOutcome { delivered: false }
            }
        }
    }

    async fn handle_signal(&self, signal: ProcessSignal) {
        let ProcessSignal { generation, kind } = signal;
        let mut inner = self.inner.lock().await;
        let current = inner
            .attached
            .as_ref()
            .is_some_and(|a| a.generation == generation);

        match kind {
            SignalKind::Line { stream, text } => {
                let ready = current
                    && inner.state == ProcessState::Starting
                    && stream == StreamKind::Stdout
                    && self.options.readiness.is_ready(&text);
                self.bus.publish_line(OutputEvent::new(stream, text));

                if ready {
                    self.transition(&mut inner, ProcessState::Running);
                    self.bus.publish_line(OutputEvent::system("Server is ready"));
                }
            }
            SignalKind::Error(message) => {
                if !current {
                    debug!(generation, %message, "Ignoring error from stale process");
                    return;
                }
                warn!(generation, %message, "Process handle reported an error");
                self.force_detach(&mut inner);
                self.bus
                    .publish_line(OutputEvent::error(format!("Server process error: {message}")));
                self.transition(&mut inner, ProcessState::Error);
            }
            SignalKind::Exited { code } => {
                if !current {
                    debug!(generation, ?code, "Ignoring exit of stale process");
                    return;
                }
                if let Some(timer) = inner.attached.take().and_then(|a| a.stop_timer) {
                    timer.cancel();
                }
                info!(generation, ?code, state = %inner.state, "Process exited");
                self.bus.publish_line(OutputEvent::system(match code {
                    Some(code) => format!("Server process exited with code {code}"),
                    None => "Server process was terminated".to_string(),
                }));
                self.transition(&mut inner, ProcessState::Stopped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};
    use warden_core::ErrorKind;

    use super::*;
    use crate::testing::{
        FakeLauncher, READY_LINE, supervisor_with, supervisor_with_config, wait_for_state,
    };

    async fn running(launcher: &Arc<FakeLauncher>) -> LifecycleSupervisor {
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();
        launcher.process(1).emit_line(READY_LINE);
        wait_for_state(&supervisor, ProcessState::Running).await;
        supervisor
    }

    async fn next_state(sub: &mut Subscription) -> ProcessState {
        loop {
            let event = timeout(Duration::from_secs(2), sub.recv())
                .await
                .expect("timed out waiting for state event")
                .expect("bus closed");
            if let Some(state) = event.as_state() {
                return state;
            }
        }
    }

    #[tokio::test]
    async fn test_start_broadcasts_starting_then_running_on_ready_line() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        let mut sub = supervisor.subscribe();
        assert_eq!(next_state(&mut sub).await, ProcessState::Stopped);

        supervisor.start().await.unwrap();
        assert_eq!(next_state(&mut sub).await, ProcessState::Starting);

        launcher.process(1).emit_line("Preparing spawn area: 40%");
        launcher
            .process(1)
            .emit_line("Done (12.3s)! For help, type \"help\"");
        assert_eq!(next_state(&mut sub).await, ProcessState::Running);

        let config = launcher.last_config().unwrap();
        assert_eq!(config.min_heap, "1G");
        assert_eq!(config.max_heap, "2G");
        assert!(config.use_optimized_flags);
    }

    #[tokio::test]
    async fn test_ready_line_on_stderr_does_not_promote() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();

        launcher
            .process(1)
            .emit(StreamKind::Stderr, READY_LINE);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(supervisor.state(), ProcessState::Starting);
    }

    #[tokio::test]
    async fn test_start_rejected_in_every_non_stopped_state() {
        // starting
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();
        let err = supervisor.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(supervisor.state(), ProcessState::Starting);

        // running
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = running(&launcher).await;
        assert!(matches!(
            supervisor.start().await,
            Err(SupervisorError::AlreadyRunning(ProcessState::Running))
        ));
        assert_eq!(supervisor.state(), ProcessState::Running);

        // stopping
        let launcher = Arc::new(FakeLauncher::default().ignoring_graceful());
        let supervisor = running(&launcher).await;
        supervisor.request_stop().await.unwrap();
        assert!(supervisor.start().await.is_err());
        assert_eq!(supervisor.state(), ProcessState::Stopping);

        // error
        let launcher = Arc::new(FakeLauncher::default().failing());
        let supervisor = supervisor_with(launcher.clone());
        assert!(supervisor.start().await.is_err());
        assert_eq!(supervisor.state(), ProcessState::Error);
        assert!(matches!(
            supervisor.start().await,
            Err(SupervisorError::AlreadyRunning(ProcessState::Error))
        ));
        assert_eq!(launcher.launch_attempts(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_reports_launch_error_and_error_state() {
        let launcher = Arc::new(FakeLauncher::default().failing());
        let supervisor = supervisor_with(launcher);
        let err = supervisor.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Launch);
        assert_eq!(supervisor.state(), ProcessState::Error);

        let history = supervisor.events().history();
        assert!(
            history
                .iter()
                .any(|e| e.stream == StreamKind::Error && e.line.contains("Failed to start"))
        );
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_without_transition() {
        let launcher = Arc::new(FakeLauncher::default());
        let config = LaunchConfig::default().with_heap("8G", "1G");
        let supervisor = supervisor_with_config(launcher.clone(), config);

        let err = supervisor.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(
            err,
            SupervisorError::Config(ConfigError::Invalid(_))
        ));
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(launcher.launch_attempts(), 0);
    }

    #[tokio::test]
    async fn test_kill_from_any_state_ends_stopped() {
        // stopped: no-op
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        supervisor.kill().await;
        assert_eq!(supervisor.state(), ProcessState::Stopped);

        // starting
        supervisor.start().await.unwrap();
        supervisor.kill().await;
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(launcher.process(1).kill_count(), 1);

        // running
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = running(&launcher).await;
        supervisor.kill().await;
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(supervisor.pid(), None);

        // stopping
        let launcher = Arc::new(FakeLauncher::default().ignoring_graceful());
        let supervisor = running(&launcher).await;
        supervisor.request_stop().await.unwrap();
        supervisor.kill().await;
        assert_eq!(supervisor.state(), ProcessState::Stopped);

        // error
        let launcher = Arc::new(FakeLauncher::default().failing());
        let supervisor = supervisor_with(launcher.clone());
        let _ = supervisor.start().await;
        supervisor.kill().await;
        assert_eq!(supervisor.state(), ProcessState::Stopped);

        // start is legal again afterwards
        let _ = supervisor.start().await;
        assert_eq!(launcher.launch_attempts(), 2);
    }

    #[tokio::test]
    async fn test_stop_escalates_to_force_kill_when_graceful_is_ignored() {
        let launcher = Arc::new(FakeLauncher::default().ignoring_graceful());
        let supervisor = running(&launcher).await;

        timeout(Duration::from_secs(2), supervisor.stop())
            .await
            .expect("stop did not resolve")
            .unwrap();

        assert_eq!(supervisor.state(), ProcessState::Stopped);
        let process = launcher.process(1);
        assert_eq!(process.writes(), vec!["stop".to_string()]);
        assert_eq!(process.kill_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_resolves_on_clean_exit_without_kill() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = running(&launcher).await;

        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(launcher.process(1).kill_count(), 0);

        // the disarmed timer must not fire later
        sleep(supervisor.timings().stop_timeout * 2).await;
        assert_eq!(launcher.process(1).kill_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_fails() {
        let supervisor = supervisor_with(Arc::new(FakeLauncher::default()));
        assert!(matches!(
            supervisor.stop().await,
            Err(SupervisorError::AlreadyStopped)
        ));
    }

    #[tokio::test]
    async fn test_stop_clears_error_state() {
        let supervisor = supervisor_with(Arc::new(FakeLauncher::default().failing()));
        let _ = supervisor.start().await;
        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.state(), ProcessState::Stopped);
    }

    #[tokio::test]
    async fn test_stale_stop_timer_does_not_kill_next_process() {
        let launcher = Arc::new(FakeLauncher::default().ignoring_graceful());
        let supervisor = running(&launcher).await;

        // Arm a timer for generation 1, then let the process exit on its own.
        supervisor.request_stop().await.unwrap();
        launcher.process(1).exit(Some(0));
        wait_for_state(&supervisor, ProcessState::Stopped).await;

        supervisor.start().await.unwrap();
        launcher.process(2).emit_line(READY_LINE);
        wait_for_state(&supervisor, ProcessState::Running).await;

        sleep(supervisor.timings().stop_timeout * 2).await;
        assert_eq!(supervisor.state(), ProcessState::Running);
        assert_eq!(launcher.process(2).kill_count(), 0);
        assert_eq!(launcher.process(1).kill_count(), 0);
    }

    #[tokio::test]
    async fn test_timer_for_old_generation_is_ignored_while_new_one_stops() {
        let launcher = Arc::new(FakeLauncher::default().ignoring_graceful());
        let supervisor = running(&launcher).await;
        supervisor.kill().await;

        supervisor.start().await.unwrap();
        launcher.process(2).emit_line(READY_LINE);
        wait_for_state(&supervisor, ProcessState::Running).await;
        supervisor.request_stop().await.unwrap();

        // A timer left over from generation 1 fires late.
        supervisor.shared.on_stop_timeout(1).await;
        assert_eq!(supervisor.state(), ProcessState::Stopping);
        assert_eq!(launcher.process(2).kill_count(), 0);

        supervisor.shared.on_stop_timeout(2).await;
        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(launcher.process(2).kill_count(), 1);
    }

    #[tokio::test]
    async fn test_command_while_stopped_is_echoed_only() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        let mut sub = supervisor.subscribe();
        sub.recv().await.unwrap();

        let outcome = supervisor.send_command("say hi").await;
        assert!(!outcome.delivered);

        match sub.recv().await.unwrap() {
            PanelEvent::Output(event) => {
                assert_eq!(event.stream, StreamKind::Command);
                assert_eq!(event.line, "say hi");
            }
            other => panic!("expected command echo, got {other:?}"),
        }
        assert_eq!(launcher.launch_attempts(), 0);
        assert_eq!(supervisor.state(), ProcessState::Stopped);
    }

    #[tokio::test]
    async fn test_command_while_running_is_written() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = running(&launcher).await;

        let outcome = supervisor.send_command("list\n").await;
        assert!(outcome.delivered);
        assert_eq!(launcher.process(1).writes(), vec!["list".to_string()]);
    }

    #[tokio::test]
    async fn test_command_while_starting_is_not_written() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();

        assert!(!supervisor.send_command("list").await.delivered);
        assert!(launcher.process(1).writes().is_empty());
    }

    #[tokio::test]
    async fn test_exit_while_starting_ends_stopped() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();

        launcher.process(1).exit(Some(1));
        wait_for_state(&supervisor, ProcessState::Stopped).await;
        assert_eq!(supervisor.status().await.pid, None);
        supervisor.start().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_error_enters_error_and_releases_handle() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = running(&launcher).await;

        launcher.process(1).fail("stdout pipe broke");
        wait_for_state(&supervisor, ProcessState::Error).await;
        assert_eq!(launcher.process(1).kill_count(), 1);

        // The exit that follows a handle error belongs to a released handle.
        sleep(Duration::from_millis(30)).await;
        assert_eq!(supervisor.state(), ProcessState::Error);
        assert_eq!(supervisor.pid(), None);
    }

    #[tokio::test]
    async fn test_status_reports_pid_and_generation() {
        let launcher = Arc::new(FakeLauncher::default());
        let supervisor = running(&launcher).await;

        let status = supervisor.status().await;
        assert_eq!(status.state, ProcessState::Running);
        assert_eq!(status.generation, 1);
        assert!(status.pid.is_some());
        assert!(status.started_at.is_some());
        assert!(status.restart.is_none());
        assert_eq!(supervisor.pid(), status.pid);
    }

    #[tokio::test]
    async fn test_kill_is_not_blocked_by_a_hanging_command_write() {
        let launcher = Arc::new(FakeLauncher::default().hanging_writes());
        let supervisor = running(&launcher).await;

        let writer = supervisor.clone();
        let pending = tokio::spawn(async move { writer.send_command("save-all").await });
        sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        timeout(Duration::from_millis(200), supervisor.kill())
            .await
            .expect("kill waited behind the stdin write");
        assert_eq!(supervisor.state(), ProcessState::Stopped);

        // The write fails once the process is gone.
        let outcome = timeout(Duration::from_secs(1), pending)
            .await
            .expect("write never returned")
            .unwrap();
        assert!(!outcome.delivered);
        assert!(
            !supervisor
                .events()
                .history()
                .iter()
                .any(|e| e.line.starts_with("Failed to send command"))
        );
    }

    #[tokio::test]
    async fn test_status_and_commands_stay_responsive_during_hanging_write() {
        let launcher = Arc::new(FakeLauncher::default().hanging_writes());
        let supervisor = running(&launcher).await;

        let writer = supervisor.clone();
        let pending = tokio::spawn(async move { writer.send_command("first").await });
        sleep(Duration::from_millis(20)).await;

        let status = timeout(Duration::from_millis(200), supervisor.status())
            .await
            .expect("status waited behind the stdin write");
        assert_eq!(status.state, ProcessState::Running);

        let second = supervisor.clone();
        let pending_second = tokio::spawn(async move { second.send_command("second").await });
        sleep(Duration::from_millis(20)).await;
        let echoed = supervisor
            .events()
            .history()
            .iter()
            .filter(|e| e.stream == StreamKind::Command)
            .count();
        assert_eq!(echoed, 2);

        supervisor.kill().await;
        assert!(!pending.await.unwrap().delivered);
        assert!(!pending_second.await.unwrap().delivered);
    }

    #[tokio::test]
    async fn test_stop_timer_fires_while_shutdown_write_hangs() {
        let launcher = Arc::new(FakeLauncher::default().hanging_writes());
        let supervisor = running(&launcher).await;

        timeout(Duration::from_secs(2), supervisor.stop())
            .await
            .expect("stop did not resolve")
            .unwrap();

        assert_eq!(supervisor.state(), ProcessState::Stopped);
        assert_eq!(launcher.process(1).kill_count(), 1);
        assert!(
            supervisor
                .events()
                .history()
                .iter()
                .any(|e| e.line.starts_with("Server did not stop within"))
        );
        assert!(
            !supervisor
                .events()
                .history()
                .iter()
                .any(|e| e.line.starts_with("Graceful shutdown failed"))
        );
    }
}
