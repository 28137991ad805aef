//! Host metrics source port.

use crate::error::SamplingError;
use crate::events::TelemetrySnapshot;

/// Produces telemetry samples on demand.
///
/// CPU usage is a delta between refreshes, so sources keep state between
/// calls and are owned by a single poller.
pub trait MetricsSource: Send {
    /// Sample host usage, plus usage of `pid` when given.
    fn sample(&mut self, pid: Option<u32>) -> Result<TelemetrySnapshot, SamplingError>;
}
