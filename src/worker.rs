// Poll loop: the single periodic driver.
// Sampling happens without the state lock; apply + dispatch happen under it,
// so ticks and user-action callbacks never interleave their mutations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

use crate::dispatcher::AlertDispatcher;
use crate::sampler::Sampler;
use crate::state::SharedState;

/// Counters surfaced by the periodic stats log and `/api/status`.
#[derive(Debug, Default)]
pub struct TickStats {
    pub ticks: AtomicU64,
    pub sample_failures: AtomicU64,
    pub events_emitted: AtomicU64,
}

impl TickStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn sample_failures(&self) -> u64 {
        self.sample_failures.load(Ordering::Relaxed)
    }

    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Snapshot applied; this many events were forwarded.
    Applied { events: usize },
    /// Sampler failed; nothing was mutated.
    NoData,
}

/// Sampler, shared state, dispatcher and shutdown for the worker.
pub struct WorkerDeps<S> {
    pub sampler: Arc<S>,
    pub state: SharedState,
    pub dispatcher: Arc<AlertDispatcher>,
    pub stats: Arc<TickStats>,
    pub ws_alert_connections: Arc<AtomicUsize>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing config. Fixed at startup.
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Runs exactly one tick: sample, then apply and dispatch under the state lock.
pub async fn run_tick<S: Sampler>(
    sampler: &S,
    state: &SharedState,
    dispatcher: &AlertDispatcher,
    stats: &TickStats,
    now: std::time::Instant,
) -> TickOutcome {
    stats.ticks.fetch_add(1, Ordering::Relaxed);

    let snapshot = match sampler.sample().await {
        Ok(s) => s,
        Err(e) => {
            stats.sample_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, operation = "sample", "sampling failed; skipping tick");
            return TickOutcome::NoData;
        }
    };

    let raised_at = chrono::Utc::now();
    let mut guard = state.lock().await;
    let events = guard.apply_snapshot(&snapshot, now);
    dispatcher.dispatch_all(&events, raised_at);
    drop(guard);

    stats
        .events_emitted
        .fetch_add(events.len() as u64, Ordering::Relaxed);
    if !events.is_empty() {
        tracing::debug!(
            events = events.len(),
            processes = snapshot.processes.len(),
            "tick produced alert events"
        );
    }
    TickOutcome::Applied {
        events: events.len(),
    }
}

pub fn spawn<S: Sampler>(deps: WorkerDeps<S>, config: WorkerConfig) -> JoinHandle<()> {
    let WorkerDeps {
        sampler,
        state,
        dispatcher,
        stats,
        ws_alert_connections,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        poll_interval_ms,
        stats_log_interval_secs,
    } = config;

    let stats_log_interval = Duration::from_secs(stats_log_interval_secs);

    let worker_span = tracing::span!(tracing::Level::DEBUG, "worker", poll_interval_ms);

    let run = async move {
        let mut tick = interval(Duration::from_millis(poll_interval_ms));
        // A slow tick delays the next one; ticks are never run back to back to catch up.
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    // Monotonic, read once per tick: sustain windows have one tick of slack.
                    let now = Instant::now().into_std();
                    run_tick(sampler.as_ref(), &state, &dispatcher, &stats, now).await;
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let (tracked, memory_usage) = {
                        let state = state.lock().await;
                        (state.registry.len(), state.memory.state().usage_percent)
                    };
                    tracing::info!(
                        tracked_processes = tracked,
                        memory_usage_percent = memory_usage,
                        outstanding_alerts = dispatcher.outstanding().len(),
                        ticks = stats.ticks(),
                        sample_failures = stats.sample_failures(),
                        ws_alert_clients = ws_alert_connections.load(Ordering::Relaxed),
                        "app stats"
                    );
                }
            }
        }
    };

    tokio::spawn(run.instrument(worker_span))
}

/// Stops the poll loop, waits for it, then withdraws every outstanding alert
/// so clients keep nothing stale once the daemon is gone.
pub async fn shutdown(
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
    dispatcher: &AlertDispatcher,
) {
    let _ = shutdown_tx.send(());
    if let Err(e) = handle.await {
        tracing::warn!(error = %e, "worker task ended abnormally");
    }
    dispatcher.withdraw_all();
}
