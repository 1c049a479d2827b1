// Snapshot source via sysinfo

use std::sync::Arc;
use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::instrument;

use super::Sampler;
use crate::error::SampleError;
use crate::models::{ProcessSample, Snapshot};

/// Keeps one `System` across ticks; sysinfo derives per-process CPU usage
/// from the delta between two refreshes, so the first sample reads 0%.
pub struct SysinfoSampler {
    sys: Arc<std::sync::Mutex<System>>,
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_memory(MemoryRefreshKind::everything())
                .with_processes(ProcessRefreshKind::nothing().with_cpu()),
        );
        Self {
            sys: Arc::new(std::sync::Mutex::new(sys)),
        }
    }
}

impl Sampler for SysinfoSampler {
    #[instrument(skip(self), fields(sampler = "sysinfo", operation = "sample"))]
    async fn sample(&self) -> Result<Snapshot, SampleError> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys.lock().map_err(|_| SampleError::Poisoned)?;
            sys.refresh_memory();
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_cpu(),
            );

            let total = sys.total_memory();
            if total == 0 {
                return Err(SampleError::NoMemoryData);
            }
            let free_memory_percent =
                (sys.available_memory() as f64 / total as f64 * 100.0).clamp(0.0, 100.0);

            let processes = sys
                .processes()
                .iter()
                // Linux lists threads as tasks of their process; only whole processes are tracked.
                .filter(|(_, p)| p.thread_kind().is_none())
                .map(|(pid, p)| {
                    (
                        pid.as_u32(),
                        ProcessSample {
                            cpu_percent: p.cpu_usage() as f64,
                            name: p.name().to_string_lossy().into_owned(),
                        },
                    )
                })
                .collect();

            Ok(Snapshot {
                processes,
                free_memory_percent,
            })
        })
        .await
        .map_err(|e| SampleError::Join(e.to_string()))?
    }
}
