//! Host and process resource samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource usage of the managed process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUsage {
    pub pid: u32,
    pub cpu_percent: f32,
    /// Resident set size in bytes.
    pub memory_bytes: u64,
}

/// One telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Global CPU usage across all cores (0-100).
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// Present only while a managed process is attached and visible to the sampler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessUsage>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetrySnapshot {
    /// Host memory usage as a percentage, `0.0` when the total is unknown.
    #[allow(clippy::cast_precision_loss)]
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total_bytes == 0 {
            return 0.0;
        }
        self.memory_used_bytes as f64 / self.memory_total_bytes as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_percent() {
        let snapshot = TelemetrySnapshot {
            cpu_percent: 12.5,
            memory_used_bytes: 512,
            memory_total_bytes: 2048,
            process: None,
            timestamp: Utc::now(),
        };
        assert!((snapshot.memory_percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_process_usage_is_camel_case() {
        let snapshot = TelemetrySnapshot {
            cpu_percent: 1.0,
            memory_used_bytes: 1,
            memory_total_bytes: 2,
            process: Some(ProcessUsage {
                pid: 42,
                cpu_percent: 3.0,
                memory_bytes: 1024,
            }),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"memoryBytes\":1024"));
        assert!(json.contains("\"memoryTotalBytes\":2"));
    }
}
