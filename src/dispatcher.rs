// Bridge between internal alert events and the notification subsystem, and
// back from user actions to the registry and the OS.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

use crate::error::UnknownActionError;
use crate::models::{AlertEvent, AlertId, Notification, Pid, SignalKind, UserAction};
use crate::notifier::Notifier;
use crate::os::{Signaller, SystemMonitorLauncher};
use crate::state::SharedState;

/// Result of a handled user action, returned to the caller of the callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ActionOutcome {
    #[serde(rename_all = "camelCase")]
    Signalled {
        pid: Pid,
        kind: SignalKind,
        delivered: bool,
        /// Whether the registry was still tracking the pid.
        was_tracked: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DetailsOpened {
        launched: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    signaller: Arc<dyn Signaller>,
    launcher: Arc<dyn SystemMonitorLauncher>,
    state: SharedState,
    outstanding: Mutex<BTreeSet<AlertId>>,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        signaller: Arc<dyn Signaller>,
        launcher: Arc<dyn SystemMonitorLauncher>,
        state: SharedState,
    ) -> Self {
        Self {
            notifier,
            signaller,
            launcher,
            state,
            outstanding: Mutex::new(BTreeSet::new()),
        }
    }

    fn outstanding_guard(&self) -> MutexGuard<'_, BTreeSet<AlertId>> {
        self.outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn outstanding(&self) -> Vec<AlertId> {
        self.outstanding_guard().iter().copied().collect()
    }

    pub fn is_outstanding(&self, id: AlertId) -> bool {
        self.outstanding_guard().contains(&id)
    }

    /// Forwards one event. Never fails: delivery problems are logged and the
    /// next transition for the same id tries again.
    pub fn dispatch(&self, event: &AlertEvent, raised_at: DateTime<Utc>) {
        let id = event.alert_id();
        match Notification::for_event(event, raised_at) {
            Some(notification) => match self.notifier.deliver(&notification) {
                Ok(()) => {
                    self.outstanding_guard().insert(id);
                }
                Err(e) => {
                    tracing::warn!(error = %e, alert = %id, operation = "deliver", "alert delivery failed");
                }
            },
            None => self.withdraw(id),
        }
    }

    pub fn dispatch_all(&self, events: &[AlertEvent], raised_at: DateTime<Utc>) {
        for event in events {
            self.dispatch(event, raised_at);
        }
    }

    /// Withdraws `id` if a notification is outstanding; otherwise does nothing.
    fn withdraw(&self, id: AlertId) {
        if !self.is_outstanding(id) {
            return;
        }
        match self.notifier.withdraw(id) {
            Ok(()) => {
                self.outstanding_guard().remove(&id);
            }
            Err(e) => {
                tracing::warn!(error = %e, alert = %id, operation = "withdraw", "alert withdrawal failed");
            }
        }
    }

    /// Withdraws everything still outstanding (used on shutdown).
    pub fn withdraw_all(&self) {
        for id in self.outstanding() {
            self.withdraw(id);
        }
    }

    /// Callback from the notification subsystem.
    ///
    /// Process alerts accept `terminate` and `kill`; the pid is dropped from the
    /// registry right away whether or not the signal landed. Any action on the
    /// memory alert opens the system monitor.
    #[instrument(skip(self), fields(operation = "user_action"))]
    pub async fn handle_user_action(
        &self,
        alert: AlertId,
        action_id: &str,
    ) -> Result<ActionOutcome, UnknownActionError> {
        match alert {
            AlertId::Memory => {
                if UserAction::from_action_id(action_id) != Some(UserAction::OpenDetails) {
                    tracing::debug!(
                        action = action_id,
                        "unrecognized action on memory alert; opening system monitor"
                    );
                }
                Ok(self.open_details())
            }
            AlertId::Process(pid) => {
                let kind = UserAction::from_action_id(action_id)
                    .and_then(UserAction::signal_kind)
                    .ok_or_else(|| {
                        let err = UnknownActionError {
                            alert,
                            action: action_id.to_string(),
                        };
                        tracing::warn!(error = %err, "ignoring notification action");
                        err
                    })?;
                Ok(self.remediate(pid, kind).await)
            }
        }
    }

    async fn remediate(&self, pid: Pid, kind: SignalKind) -> ActionOutcome {
        let signal_result = self.signaller.signal(pid, kind);
        if let Err(e) = &signal_result {
            tracing::warn!(error = %e, pid, ?kind, "signal failed; dropping pid anyway");
        }

        let was_tracked = {
            let mut state = self.state.lock().await;
            let removed = state.registry.remove(pid).is_some();
            self.withdraw(AlertId::Process(pid));
            removed
        };

        ActionOutcome::Signalled {
            pid,
            kind,
            delivered: signal_result.is_ok(),
            was_tracked,
            error: signal_result.err().map(|e| e.to_string()),
        }
    }

    fn open_details(&self) -> ActionOutcome {
        match self.launcher.open() {
            Ok(()) => ActionOutcome::DetailsOpened {
                launched: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, operation = "open_system_monitor", "failed to open system monitor");
                ActionOutcome::DetailsOpened {
                    launched: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
