// Per-process hysteresis: turns periodic CPU samples into debounced raise/clear events.

use std::collections::HashMap;
use std::time::Instant;

use crate::models::{AlertEvent, Pid, Snapshot, Thresholds};

/// Tracking state for one live pid.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessState {
    pub pid: Pid,
    pub name: String,
    pub last_cpu: f64,
    /// Set on the first tick at or above the threshold, cleared when it drops below.
    pub breach_start: Option<Instant>,
    /// True iff an alert is outstanding for this pid.
    pub alert_active: bool,
}

impl ProcessState {
    fn new(pid: Pid) -> Self {
        Self {
            pid,
            name: String::new(),
            last_cpu: 0.0,
            breach_start: None,
            alert_active: false,
        }
    }
}

pub struct ProcessRegistry {
    thresholds: Thresholds,
    states: HashMap<Pid, ProcessState>,
}

impl ProcessRegistry {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            states: HashMap::new(),
        }
    }

    /// Applies one snapshot and returns the transitions it caused.
    ///
    /// Events for pids in the snapshot come first in ascending pid order,
    /// followed by clears for pids that disappeared (also ascending).
    /// Re-applying the same snapshot with the same `now` emits nothing.
    pub fn apply(&mut self, snapshot: &Snapshot, now: Instant) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for (&pid, sample) in &snapshot.processes {
            let state = self
                .states
                .entry(pid)
                .or_insert_with(|| ProcessState::new(pid));
            state.last_cpu = sample.cpu_percent;
            if state.name != sample.name {
                state.name.clone_from(&sample.name);
            }

            if state.last_cpu < self.thresholds.cpu_percent {
                if state.alert_active {
                    state.alert_active = false;
                    tracing::info!(pid, cpu = state.last_cpu, "cpu alert cleared");
                    events.push(AlertEvent::ProcessCleared { pid });
                }
                state.breach_start = None;
                continue;
            }

            match state.breach_start {
                None => {
                    tracing::debug!(pid, cpu = state.last_cpu, "cpu breach window started");
                    state.breach_start = Some(now);
                }
                Some(start)
                    if !state.alert_active
                        && now.saturating_duration_since(start) >= self.thresholds.sustain =>
                {
                    state.alert_active = true;
                    tracing::info!(
                        pid,
                        name = %state.name,
                        cpu = state.last_cpu,
                        "cpu alert raised"
                    );
                    events.push(AlertEvent::ProcessRaised {
                        pid,
                        cpu_percent: state.last_cpu,
                        name: state.name.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        let mut gone: Vec<Pid> = self
            .states
            .keys()
            .copied()
            .filter(|pid| !snapshot.contains(*pid))
            .collect();
        gone.sort_unstable();
        for pid in gone {
            if let Some(state) = self.states.remove(&pid)
                && state.alert_active
            {
                tracing::info!(pid, "process exited with cpu alert active");
                events.push(AlertEvent::ProcessCleared { pid });
            }
        }

        events
    }

    /// Drops tracking for `pid` without emitting anything; the caller owns any
    /// notification cleanup.
    pub fn remove(&mut self, pid: Pid) -> Option<ProcessState> {
        self.states.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessState> {
        self.states.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn active_alerts(&self) -> usize {
        self.states.values().filter(|s| s.alert_active).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessState> {
        self.states.values()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}
