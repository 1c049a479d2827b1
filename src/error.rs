// Error taxonomy for the monitor core and its collaborators.
// None of these are fatal: callers log them and keep going.

use thiserror::Error;

use crate::models::{AlertId, Pid, SignalKind};

/// The sampler could not produce a snapshot this tick.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("sampler lock poisoned")]
    Poisoned,
    #[error("sampler task join: {0}")]
    Join(String),
    #[error("memory totals unavailable")]
    NoMemoryData,
    #[error("sampler source failed: {0}")]
    Source(String),
}

/// The notification subsystem rejected or failed a deliver/withdraw call.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("notification store lock poisoned")]
    Poisoned,
    #[error("notification for {id} rejected: {reason}")]
    Rejected { id: AlertId, reason: String },
}

/// A user-action callback named an action this dispatcher does not handle.
#[derive(Debug, Error)]
#[error("unknown notification action `{action}` for {alert}")]
pub struct UnknownActionError {
    pub alert: AlertId,
    pub action: String,
}

/// The OS refused to signal a process.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("no such process: {0}")]
    NoSuchProcess(Pid),
    #[error("{kind:?} signal not supported on this platform (pid {pid})")]
    Unsupported { pid: Pid, kind: SignalKind },
    #[error("{kind:?} signal to pid {pid} was refused")]
    Refused { pid: Pid, kind: SignalKind },
    #[error("signaller lock poisoned")]
    Poisoned,
}

/// Opening the system monitor utility failed.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no system monitor command configured")]
    NotConfigured,
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("invalid alert id `{0}`")]
pub struct AlertIdParseError(pub String);
