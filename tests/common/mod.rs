// Shared test helpers: scripted sampler and recording collaborators
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysguard::dispatcher::AlertDispatcher;
use sysguard::error::{DeliveryError, LaunchError, SampleError, SignalError};
use sysguard::models::{AlertId, Notification, Pid, SignalKind, Snapshot, Thresholds};
use sysguard::notifier::Notifier;
use sysguard::os::{Signaller, SystemMonitorLauncher};
use sysguard::sampler::Sampler;
use sysguard::state::{MonitorState, SharedState};

pub fn at(t0: Instant, secs: u64) -> Instant {
    t0 + Duration::from_secs(secs)
}

/// Fixed wall-clock time stamped on notifications raised in tests.
pub fn wall() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

/// Snapshot with a single process and plenty of free memory.
pub fn one_process(pid: Pid, cpu: f64) -> Snapshot {
    Snapshot::new(60.0).with_process(pid, format!("proc-{pid}"), cpu)
}

/// Returns queued results in order; once drained, repeats the last snapshot.
#[derive(Default)]
pub struct ScriptedSampler {
    queue: Mutex<VecDeque<Result<Snapshot, SampleError>>>,
    last: Mutex<Option<Snapshot>>,
    pub calls: AtomicUsize,
}

impl ScriptedSampler {
    pub fn new(script: Vec<Result<Snapshot, SampleError>>) -> Self {
        Self {
            queue: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn repeating(snapshot: Snapshot) -> Self {
        Self::new(vec![Ok(snapshot)])
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

impl Sampler for ScriptedSampler {
    async fn sample(&self) -> Result<Snapshot, SampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SampleError::Source("no data scripted".into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifierCall {
    Deliver(AlertId),
    Withdraw(AlertId),
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<NotifierCall>>,
    pub delivered: Mutex<Vec<Notification>>,
    pub fail_deliver: AtomicBool,
    pub fail_withdraw: AtomicBool,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_delivered(&self) -> Option<Notification> {
        self.delivered.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.calls
            .lock()
            .unwrap()
            .push(NotifierCall::Deliver(notification.id));
        if self.fail_deliver.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected {
                id: notification.id,
                reason: "test".into(),
            });
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn withdraw(&self, id: AlertId) -> Result<(), DeliveryError> {
        self.calls.lock().unwrap().push(NotifierCall::Withdraw(id));
        if self.fail_withdraw.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected {
                id,
                reason: "test".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSignaller {
    pub sent: Mutex<Vec<(Pid, SignalKind)>>,
    pub fail: AtomicBool,
}

impl RecordingSignaller {
    pub fn sent(&self) -> Vec<(Pid, SignalKind)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Signaller for RecordingSignaller {
    fn signal(&self, pid: Pid, kind: SignalKind) -> Result<(), SignalError> {
        self.sent.lock().unwrap().push((pid, kind));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SignalError::NoSuchProcess(pid));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub opened: AtomicUsize,
    pub fail: AtomicBool,
}

impl SystemMonitorLauncher for RecordingLauncher {
    fn open(&self) -> Result<(), LaunchError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(LaunchError::NotConfigured);
        }
        Ok(())
    }
}

/// State + dispatcher wired to recording collaborators.
pub struct Harness {
    pub state: SharedState,
    pub notifier: Arc<RecordingNotifier>,
    pub signaller: Arc<RecordingSignaller>,
    pub launcher: Arc<RecordingLauncher>,
    pub dispatcher: Arc<AlertDispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_thresholds(Thresholds::default())
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        let state = MonitorState::shared(thresholds);
        let notifier = Arc::new(RecordingNotifier::default());
        let signaller = Arc::new(RecordingSignaller::default());
        let launcher = Arc::new(RecordingLauncher::default());
        let dispatcher = Arc::new(AlertDispatcher::new(
            notifier.clone(),
            signaller.clone(),
            launcher.clone(),
            state.clone(),
        ));
        Self {
            state,
            notifier,
            signaller,
            launcher,
            dispatcher,
        }
    }
}
