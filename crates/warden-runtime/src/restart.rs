//! Five-stage verified restart.
//!
//! 1. Assess: stop the process if it is up, swallowing stop errors.
//! 2. Verify shutdown: after a short delay, force-kill anything still attached.
//! 3. Re-initialize: after a short delay, start a fresh process.
//! 4. Await readiness: poll until `running`, within a wall-clock budget.
//! 5. Final confirmation: after a short delay, require `running` again.
//!
//! Any stage failure force-kills whatever is attached, leaves the supervisor
//! `stopped`, publishes `restart-failed`, and returns a protocol error.
//! Success publishes `restart-completed` after the new process's `running`
//! transition.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warden_core::{
    OutputEvent, PanelEvent, ProcessState, RestartSessionInfo, RestartStage, SupervisorError,
};

use crate::supervisor::{LifecycleSupervisor, Shared};

/// Scope guard for the restart-in-progress flag and the session it owns.
///
/// A restart future dropped between stages never reaches its outcome
/// handling, so the guard also removes its session from the status.
struct RestartGuard {
    shared: Arc<Shared>,
    session_id: Uuid,
}

impl RestartGuard {
    fn acquire(shared: &Arc<Shared>, session_id: Uuid) -> Option<Self> {
        shared
            .restart_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                shared: Arc::clone(shared),
                session_id,
            })
    }
}

impl Drop for RestartGuard {
    fn drop(&mut self) {
        let session_id = self.session_id;
        match self.shared.inner.try_lock() {
            Ok(mut inner) => inner.clear_session(session_id),
            Err(_) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let shared = Arc::clone(&self.shared);
                    runtime.spawn(async move {
                        shared.inner.lock().await.clear_session(session_id);
                    });
                }
            }
        }
        self.shared.restart_active.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct StageFailure {
    stage: RestartStage,
    reason: String,
}

impl StageFailure {
    fn new(stage: RestartStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

type StageResult<T = ()> = Result<T, StageFailure>;

impl LifecycleSupervisor {
    /// Restart the managed process through the staged protocol.
    ///
    /// Only one restart may run at a time; `start`, `stop` and
    /// `request_stop` are rejected while it does. `kill` is still honoured
    /// and aborts the restart.
    ///
    /// # Errors
    ///
    /// `RestartInProgress` if another restart is active, otherwise
    /// `Protocol` naming the failed stage. On failure the process is
    /// `stopped` with nothing attached.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let shared = &self.shared;
        let session_id = Uuid::new_v4();
        let Some(_guard) = RestartGuard::acquire(shared, session_id) else {
            return Err(SupervisorError::RestartInProgress);
        };
        shared.restart_aborted.store(false, Ordering::SeqCst);

        let started = Instant::now();
        let started_at = Utc::now();
        let budget = chrono::Duration::from_std(shared.options.timings.restart_budget())
            .unwrap_or_else(|_| chrono::Duration::zero());
        shared.inner.lock().await.session = Some(RestartSessionInfo {
            session_id,
            stage: RestartStage::Assess,
            started_at,
            deadline: started_at + budget,
        });

        info!(%session_id, "Restart session started");
        shared
            .bus
            .publish_line(OutputEvent::system("Restarting server..."));

        match self.run_stages(session_id).await {
            Ok(()) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                shared.inner.lock().await.session = None;

                info!(%session_id, elapsed_ms, "Restart completed");
                shared.bus.publish_line(OutputEvent::system(format!(
                    "Server restarted in {:.1}s",
                    started.elapsed().as_secs_f32()
                )));
                shared
                    .bus
                    .publish(PanelEvent::restart_completed(session_id, elapsed_ms));
                Ok(())
            }
            Err(failure) => {
                shared.fail_restart(session_id, &failure).await;
                Err(SupervisorError::Protocol {
                    stage: failure.stage,
                    reason: failure.reason,
                })
            }
        }
    }

    async fn run_stages(&self, session_id: Uuid) -> StageResult {
        let shared = &self.shared;
        let timings = shared.options.timings;

        shared.enter_stage(session_id, RestartStage::Assess).await?;
        if shared.observed().state.is_active() {
            if let Err(e) = shared.stop_and_wait().await {
                warn!(%session_id, error = %e, "Stop failed during restart, continuing");
                shared
                    .bus
                    .publish_line(OutputEvent::warning(format!("Stop during restart failed: {e}")));
            }
        }

        shared
            .enter_stage(session_id, RestartStage::VerifyShutdown)
            .await?;
        sleep(timings.verify_shutdown_delay).await;
        {
            let mut inner = shared.inner.lock().await;
            if shared.force_detach(&mut inner) {
                warn!(%session_id, "Process still attached after shutdown, killed");
                shared.bus.publish_line(OutputEvent::warning(
                    "Server was still running after stop, killed it",
                ));
            }
            shared.transition(&mut inner, ProcessState::Stopped);
        }

        shared
            .enter_stage(session_id, RestartStage::Reinitialize)
            .await?;
        sleep(timings.reinitialize_delay).await;
        shared.check_abort(RestartStage::Reinitialize)?;
        let generation = shared
            .start_process()
            .await
            .map_err(|e| StageFailure::new(RestartStage::Reinitialize, e.to_string()))?;

        shared
            .enter_stage(session_id, RestartStage::AwaitReadiness)
            .await?;
        self.await_readiness(generation).await?;

        shared
            .enter_stage(session_id, RestartStage::FinalConfirmation)
            .await?;
        sleep(timings.final_confirmation_delay).await;
        shared.check_abort(RestartStage::FinalConfirmation)?;
        let observed = shared.observed();
        if observed.state != ProcessState::Running || observed.generation != generation {
            return Err(StageFailure::new(
                RestartStage::FinalConfirmation,
                format!("server is {} after restart, expected running", observed.state),
            ));
        }

        Ok(())
    }

    async fn await_readiness(&self, generation: u64) -> StageResult {
        const STAGE: RestartStage = RestartStage::AwaitReadiness;
        let shared = &self.shared;
        let timings = shared.options.timings;
        let deadline = Instant::now() + timings.readiness_timeout;

        let mut ticker = interval(timings.readiness_poll.max(std::time::Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            shared.check_abort(STAGE)?;

            let observed = shared.observed();
            if observed.generation != generation {
                return Err(StageFailure::new(STAGE, "server was replaced while starting"));
            }
            match observed.state {
                ProcessState::Running => return Ok(()),
                ProcessState::Error => {
                    return Err(StageFailure::new(STAGE, "server entered error state while starting"));
                }
                ProcessState::Stopped => {
                    return Err(StageFailure::new(STAGE, "server exited before becoming ready"));
                }
                ProcessState::Starting | ProcessState::Stopping => {}
            }

            if Instant::now() >= deadline {
                return Err(StageFailure::new(
                    STAGE,
                    format!(
                        "timed out: server not ready within {:.1}s",
                        timings.readiness_timeout.as_secs_f32()
                    ),
                ));
            }
        }
    }
}

impl Shared {
    fn check_abort(&self, stage: RestartStage) -> StageResult {
        if self.restart_aborted.load(Ordering::SeqCst) {
            return Err(StageFailure::new(stage, "restart aborted by kill"));
        }
        Ok(())
    }

    async fn enter_stage(&self, session_id: Uuid, stage: RestartStage) -> StageResult {
        self.check_abort(stage)?;

        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.session.as_mut() {
            session.stage = stage;
        }
        debug!(%session_id, %stage, "Restart stage");
        self.bus.publish(PanelEvent::restart_progress(session_id, stage));
        Ok(())
    }

    async fn fail_restart(&self, session_id: Uuid, failure: &StageFailure) {
        error!(%session_id, stage = %failure.stage, reason = %failure.reason, "Restart failed");

        let mut inner = self.inner.lock().await;
        if self.force_detach(&mut inner) {
            debug!(%session_id, "Killed process left behind by failed restart");
        }
        self.transition(&mut inner, ProcessState::Stopped);
        inner.session = None;

        self.bus.publish_line(OutputEvent::error(format!(
            "Restart failed at stage {}: {}",
            failure.stage, failure.reason
        )));
        self.bus.publish(PanelEvent::restart_failed(
            session_id,
            failure.stage,
            failure.reason.clone(),
        ));
    }
}
