//! Fixed delays and budgets used by the supervisor and restart protocol.

use std::time::Duration;

/// Timing knobs for [`LifecycleSupervisor`](crate::LifecycleSupervisor).
///
/// Defaults are production values; tests shrink them to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTimings {
    /// How long a graceful stop may take before the process is force-killed.
    pub stop_timeout: Duration,
    /// Restart stage 2 delay before checking for a lingering handle.
    pub verify_shutdown_delay: Duration,
    /// Restart stage 3 delay before relaunching.
    pub reinitialize_delay: Duration,
    /// Restart stage 4 wall-clock budget for reaching `running`.
    pub readiness_timeout: Duration,
    /// Restart stage 4 polling interval.
    pub readiness_poll: Duration,
    /// Restart stage 5 delay before the final state check.
    pub final_confirmation_delay: Duration,
}

impl SupervisorTimings {
    /// Upper bound on how long a whole restart session can take.
    pub fn restart_budget(&self) -> Duration {
        self.stop_timeout
            + self.verify_shutdown_delay
            + self.reinitialize_delay
            + self.readiness_timeout
            + self.final_confirmation_delay
    }

    /// Same timings with a different force-kill budget.
    #[must_use]
    pub const fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(15),
            verify_shutdown_delay: Duration::from_secs(2),
            reinitialize_delay: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(60),
            readiness_poll: Duration::from_millis(500),
            final_confirmation_delay: Duration::from_secs(2),
        }
    }
}
