// Alerting constants, injected once at startup

use std::time::Duration;

pub const DEFAULT_CPU_THRESHOLD: f64 = 80.0;
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 80.0;
pub const DEFAULT_SUSTAIN: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Per-process CPU percentage; a sample at or above it counts as a breach.
    pub cpu_percent: f64,
    /// Memory usage percentage; strictly above it raises.
    pub memory_percent: f64,
    /// How long a process must stay in breach before the alert is raised.
    pub sustain: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: DEFAULT_CPU_THRESHOLD,
            memory_percent: DEFAULT_MEMORY_THRESHOLD,
            sustain: DEFAULT_SUSTAIN,
        }
    }
}
