use serde::Deserialize;
use std::time::Duration;

use crate::models::{
    DEFAULT_CPU_THRESHOLD, DEFAULT_MEMORY_THRESHOLD, DEFAULT_POLL_INTERVAL, DEFAULT_SUSTAIN,
    Thresholds,
};

/// Startup configuration. Read once; nothing here changes while running.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8090
}

fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How often to log app stats (tracked pids, outstanding alerts, tick counters) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: f64,
    #[serde(default = "default_memory_percent")]
    pub memory_percent: f64,
    #[serde(default = "default_sustain_secs")]
    pub sustain_secs: u64,
}

fn default_cpu_percent() -> f64 {
    DEFAULT_CPU_THRESHOLD
}

fn default_memory_percent() -> f64 {
    DEFAULT_MEMORY_THRESHOLD
}

fn default_sustain_secs() -> u64 {
    DEFAULT_SUSTAIN.as_secs()
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_percent(),
            memory_percent: default_memory_percent(),
            sustain_secs: default_sustain_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of alert messages buffered for /ws/alerts (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_broadcast_capacity() -> usize {
    64
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsConfig {
    /// argv of the utility opened from the memory alert.
    #[serde(default = "default_system_monitor_command")]
    pub system_monitor_command: Vec<String>,
}

fn default_system_monitor_command() -> Vec<String> {
    vec!["gnome-system-monitor".into()]
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            system_monitor_command: default_system_monitor_command(),
        }
    }
}

impl AppConfig {
    /// Loads `CONFIG_FILE` (default `config.toml`); a missing file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let s = std::fs::read_to_string(path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            cpu_percent: self.thresholds.cpu_percent,
            memory_percent: self.thresholds.memory_percent,
            sustain: Duration::from_secs(self.thresholds.sustain_secs),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.monitoring.poll_interval_ms > 0,
            "monitoring.poll_interval_ms must be > 0, got {}",
            self.monitoring.poll_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.thresholds.cpu_percent > 0.0,
            "thresholds.cpu_percent must be > 0, got {}",
            self.thresholds.cpu_percent
        );
        anyhow::ensure!(
            self.thresholds.memory_percent > 0.0 && self.thresholds.memory_percent <= 100.0,
            "thresholds.memory_percent must be in (0, 100], got {}",
            self.thresholds.memory_percent
        );
        anyhow::ensure!(
            self.thresholds.sustain_secs > 0,
            "thresholds.sustain_secs must be > 0, got {}",
            self.thresholds.sustain_secs
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.actions
                .system_monitor_command
                .first()
                .is_some_and(|c| !c.is_empty()),
            "actions.system_monitor_command must name a program"
        );
        Ok(())
    }
}
