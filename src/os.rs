// OS collaborators used by remediation actions: process signalling and
// launching the system monitor utility.

use std::process::{Command, Stdio};
use std::sync::Mutex;
use sysinfo::{Pid as SysPid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};
use tracing::instrument;

use crate::error::{LaunchError, SignalError};
use crate::models::{Pid, SignalKind};

/// Fire-and-forget termination signals. No acknowledgement is tracked.
pub trait Signaller: Send + Sync {
    fn signal(&self, pid: Pid, kind: SignalKind) -> Result<(), SignalError>;
}

/// Opens whatever the host uses as its process monitor.
pub trait SystemMonitorLauncher: Send + Sync {
    fn open(&self) -> Result<(), LaunchError>;
}

pub struct SysinfoSignaller {
    sys: Mutex<System>,
}

impl Default for SysinfoSignaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSignaller {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Signaller for SysinfoSignaller {
    #[instrument(skip(self), fields(operation = "signal"))]
    fn signal(&self, pid: Pid, kind: SignalKind) -> Result<(), SignalError> {
        let mut sys = self.sys.lock().map_err(|_| SignalError::Poisoned)?;
        let target = SysPid::from_u32(pid);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        let process = sys
            .process(target)
            .ok_or(SignalError::NoSuchProcess(pid))?;
        let signal = match kind {
            SignalKind::Graceful => Signal::Term,
            SignalKind::Forceful => Signal::Kill,
        };
        match process.kill_with(signal) {
            Some(true) => {
                tracing::info!(pid, ?kind, "signal sent");
                Ok(())
            }
            Some(false) => Err(SignalError::Refused { pid, kind }),
            None => Err(SignalError::Unsupported { pid, kind }),
        }
    }
}

/// Spawns a configured command line (detached; the child is not awaited).
pub struct CommandLauncher {
    argv: Vec<String>,
}

impl CommandLauncher {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl SystemMonitorLauncher for CommandLauncher {
    fn open(&self) -> Result<(), LaunchError> {
        let (program, args) = self.argv.split_first().ok_or(LaunchError::NotConfigured)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: self.argv.join(" "),
                source,
            })?;
        tracing::info!(command = %program, pid = child.id(), "system monitor launched");
        // Reap in the background so the child never lingers as a zombie.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}
