// Registry + memory monitor behind one lock: the single serialized access point
// shared by the poll loop and the user-action callback path.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::memory::MemoryMonitor;
use crate::models::{AlertEvent, Snapshot, Thresholds};
use crate::registry::ProcessRegistry;

pub type SharedState = Arc<Mutex<MonitorState>>;

pub struct MonitorState {
    pub registry: ProcessRegistry,
    pub memory: MemoryMonitor,
}

impl MonitorState {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            registry: ProcessRegistry::new(thresholds),
            memory: MemoryMonitor::new(thresholds.memory_percent),
        }
    }

    pub fn shared(thresholds: Thresholds) -> SharedState {
        Arc::new(Mutex::new(Self::new(thresholds)))
    }

    /// Process events first, then the memory event, in the order produced.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, now: Instant) -> Vec<AlertEvent> {
        let mut events = self.registry.apply(snapshot, now);
        events.extend(self.memory.apply(snapshot.free_memory_percent, now));
        events
    }
}
