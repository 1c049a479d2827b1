// Global memory pressure: level-debounced raise/clear, no sustain window.

use std::time::Instant;

use crate::models::AlertEvent;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub usage_percent: f64,
    pub alert_active: bool,
    pub updated_at: Option<Instant>,
}

pub struct MemoryMonitor {
    threshold_percent: f64,
    state: MemoryState,
}

impl MemoryMonitor {
    pub fn new(threshold_percent: f64) -> Self {
        Self {
            threshold_percent,
            state: MemoryState::default(),
        }
    }

    /// Usage is `100 - free`; raises strictly above the threshold, clears at or below.
    pub fn apply(&mut self, free_memory_percent: f64, now: Instant) -> Option<AlertEvent> {
        let usage_percent = 100.0 - free_memory_percent;
        self.state.usage_percent = usage_percent;
        self.state.updated_at = Some(now);

        if usage_percent > self.threshold_percent && !self.state.alert_active {
            self.state.alert_active = true;
            tracing::info!(
                usage_percent,
                threshold = self.threshold_percent,
                "memory alert raised"
            );
            Some(AlertEvent::MemoryRaised { usage_percent })
        } else if usage_percent <= self.threshold_percent && self.state.alert_active {
            self.state.alert_active = false;
            tracing::info!(usage_percent, "memory alert cleared");
            Some(AlertEvent::MemoryCleared)
        } else {
            None
        }
    }

    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }
}
