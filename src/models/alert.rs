// Alert identity, lifecycle events and the notification wire format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Pid;
use crate::error::AlertIdParseError;

const PROCESS_PREFIX: &str = "pid-";
const MEMORY_ID: &str = "memory";

/// Key shared by the registry, the dispatcher and the notification surface.
///
/// Text form is `pid-<n>` for process alerts and `memory` for the single
/// memory alert; a bare number also parses as a process alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AlertId {
    Process(Pid),
    Memory,
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertId::Process(pid) => write!(f, "{PROCESS_PREFIX}{pid}"),
            AlertId::Memory => f.write_str(MEMORY_ID),
        }
    }
}

impl FromStr for AlertId {
    type Err = AlertIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(MEMORY_ID) {
            return Ok(AlertId::Memory);
        }
        let digits = s.strip_prefix(PROCESS_PREFIX).unwrap_or(s);
        digits
            .parse::<Pid>()
            .map(AlertId::Process)
            .map_err(|_| AlertIdParseError(s.to_string()))
    }
}

impl From<AlertId> for String {
    fn from(id: AlertId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AlertId {
    type Error = AlertIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Edge-triggered lifecycle transitions emitted by the registry and memory monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    ProcessRaised {
        pid: Pid,
        cpu_percent: f64,
        name: String,
    },
    ProcessCleared {
        pid: Pid,
    },
    MemoryRaised {
        usage_percent: f64,
    },
    MemoryCleared,
}

impl AlertEvent {
    pub fn alert_id(&self) -> AlertId {
        match self {
            AlertEvent::ProcessRaised { pid, .. } | AlertEvent::ProcessCleared { pid } => {
                AlertId::Process(*pid)
            }
            AlertEvent::MemoryRaised { .. } | AlertEvent::MemoryCleared => AlertId::Memory,
        }
    }

    pub fn is_raise(&self) -> bool {
        matches!(
            self,
            AlertEvent::ProcessRaised { .. } | AlertEvent::MemoryRaised { .. }
        )
    }
}

/// How hard to ask a process to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forceful,
}

/// User-selectable response attached to a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Terminate,
    ForceKill,
    OpenDetails,
}

impl UserAction {
    pub fn id(self) -> &'static str {
        match self {
            UserAction::Terminate => "terminate",
            UserAction::ForceKill => "kill",
            UserAction::OpenDetails => "details",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            UserAction::Terminate => "Terminate",
            UserAction::ForceKill => "Kill",
            UserAction::OpenDetails => "Open System Monitor",
        }
    }

    /// Accepts the wire ids plus the upper-case identifiers some notification
    /// backends echo back.
    pub fn from_action_id(action: &str) -> Option<Self> {
        match action.trim() {
            "terminate" | "TERMINATE_ACTION" => Some(UserAction::Terminate),
            "kill" | "force-kill" | "KILL_ACTION" => Some(UserAction::ForceKill),
            "details" | "DETAILS_ACTION" => Some(UserAction::OpenDetails),
            _ => None,
        }
    }

    pub fn signal_kind(self) -> Option<SignalKind> {
        match self {
            UserAction::Terminate => Some(SignalKind::Graceful),
            UserAction::ForceKill => Some(SignalKind::Forceful),
            UserAction::OpenDetails => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    pub id: String,
    pub title: String,
}

impl From<UserAction> for NotificationAction {
    fn from(action: UserAction) -> Self {
        Self {
            id: action.id().to_string(),
            title: action.title().to_string(),
        }
    }
}

/// Enough data for a client to render the alert and route an action back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AlertPayload {
    #[serde(rename_all = "camelCase")]
    Process {
        pid: Pid,
        cpu_percent: f64,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    Memory { usage_percent: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: AlertId,
    pub title: String,
    pub body: String,
    pub payload: AlertPayload,
    pub actions: Vec<NotificationAction>,
    /// Unix millis.
    pub raised_at: i64,
}

impl Notification {
    /// Builds the notification for a raise event; clears have none.
    /// `raised_at` is the wall-clock time of the tick that produced the event.
    pub fn for_event(event: &AlertEvent, raised_at: DateTime<Utc>) -> Option<Self> {
        let raised_at = raised_at.timestamp_millis();
        match event {
            AlertEvent::ProcessRaised {
                pid,
                cpu_percent,
                name,
            } => {
                let label = if name.is_empty() {
                    format!("PID {pid}")
                } else {
                    format!("{name} (PID {pid})")
                };
                Some(Self {
                    id: AlertId::Process(*pid),
                    title: "High CPU usage".into(),
                    body: format!("{label} is using {cpu_percent:.1}% CPU"),
                    payload: AlertPayload::Process {
                        pid: *pid,
                        cpu_percent: *cpu_percent,
                        name: name.clone(),
                    },
                    actions: vec![UserAction::Terminate.into(), UserAction::ForceKill.into()],
                    raised_at,
                })
            }
            AlertEvent::MemoryRaised { usage_percent } => Some(Self {
                id: AlertId::Memory,
                title: "High memory pressure".into(),
                body: format!("Memory usage is {usage_percent:.0}%"),
                payload: AlertPayload::Memory {
                    usage_percent: *usage_percent,
                },
                actions: vec![UserAction::OpenDetails.into()],
                raised_at,
            }),
            AlertEvent::ProcessCleared { .. } | AlertEvent::MemoryCleared => None,
        }
    }
}
