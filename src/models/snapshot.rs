// Point-in-time sample produced once per tick

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OS process identifier.
pub type Pid = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSample {
    pub cpu_percent: f64,
    /// Display only; never used for alerting decisions.
    #[serde(default)]
    pub name: String,
}

/// One tick worth of data. Ordered by pid so emitted events are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub processes: BTreeMap<Pid, ProcessSample>,
    pub free_memory_percent: f64,
}

impl Snapshot {
    pub fn new(free_memory_percent: f64) -> Self {
        Self {
            processes: BTreeMap::new(),
            free_memory_percent,
        }
    }

    /// Builder-style insert, handy for adapters and tests.
    pub fn with_process(mut self, pid: Pid, name: impl Into<String>, cpu_percent: f64) -> Self {
        self.processes.insert(
            pid,
            ProcessSample {
                cpu_percent,
                name: name.into(),
            },
        );
        self
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
    }
}
