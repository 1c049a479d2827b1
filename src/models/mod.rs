// Domain models shared by the sampler, state machines, dispatcher and routes

mod alert;
mod snapshot;
mod thresholds;

pub use alert::{
    AlertEvent, AlertId, AlertPayload, Notification, NotificationAction, SignalKind, UserAction,
};
pub use snapshot::{Pid, ProcessSample, Snapshot};
pub use thresholds::{
    DEFAULT_CPU_THRESHOLD, DEFAULT_MEMORY_THRESHOLD, DEFAULT_POLL_INTERVAL, DEFAULT_SUSTAIN,
    Thresholds,
};
