// Poll loop: single ticks, sampler failures, lock discipline, and the spawned loop on paused time

mod common;

use common::{Harness, NotifierCall, ScriptedSampler, at, one_process};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use sysguard::dispatcher::ActionOutcome;
use sysguard::error::SampleError;
use sysguard::models::{AlertId, SignalKind, Snapshot};
use sysguard::sampler::Sampler;
use sysguard::state::SharedState;
use sysguard::worker::{
    TickOutcome, TickStats, WorkerConfig, WorkerDeps, run_tick, shutdown, spawn,
};

/// Fails the test if the state lock is held while sampling.
struct LockCheckingSampler {
    state: SharedState,
    snapshot: Snapshot,
    calls: AtomicUsize,
}

impl Sampler for LockCheckingSampler {
    async fn sample(&self) -> Result<Snapshot, SampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            self.state.try_lock().is_ok(),
            "state lock held during sampling"
        );
        Ok(self.snapshot.clone())
    }
}

fn worker_deps(
    h: &Harness,
    sampler: Arc<ScriptedSampler>,
    stats: Arc<TickStats>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> WorkerDeps<ScriptedSampler> {
    WorkerDeps {
        sampler,
        state: h.state.clone(),
        dispatcher: h.dispatcher.clone(),
        stats,
        ws_alert_connections: Arc::new(AtomicUsize::new(0)),
        shutdown_rx,
    }
}

const FIVE_SECOND_POLL: WorkerConfig = WorkerConfig {
    poll_interval_ms: 5_000,
    stats_log_interval_secs: 3_600,
};

#[tokio::test]
async fn test_failed_sample_is_a_no_op_tick() {
    let h = Harness::new();
    let sampler = ScriptedSampler::failing();
    let stats = TickStats::default();

    let outcome = run_tick(&sampler, &h.state, &h.dispatcher, &stats, Instant::now()).await;
    assert_eq!(outcome, TickOutcome::NoData);
    assert_eq!(stats.ticks(), 1);
    assert_eq!(stats.sample_failures(), 1);

    let state = h.state.lock().await;
    assert!(state.registry.is_empty());
    assert_eq!(state.memory.state().updated_at, None);
    assert!(h.notifier.calls().is_empty());
}

#[tokio::test]
async fn test_loop_state_survives_intermittent_sampler_errors() {
    let h = Harness::new();
    let t0 = Instant::now();
    let script = (0..=60)
        .step_by(5)
        .map(|t| {
            if t == 30 {
                Err(SampleError::Source("ps exited 1".into()))
            } else {
                Ok(one_process(42, 95.0))
            }
        })
        .collect();
    let sampler = ScriptedSampler::new(script);
    let stats = TickStats::default();

    let mut outcomes = Vec::new();
    for t in (0..=60).step_by(5) {
        outcomes.push(run_tick(&sampler, &h.state, &h.dispatcher, &stats, at(t0, t)).await);
    }
    assert_eq!(outcomes[6], TickOutcome::NoData);
    assert_eq!(outcomes[12], TickOutcome::Applied { events: 1 });
    assert_eq!(stats.sample_failures(), 1);
    assert_eq!(stats.events_emitted(), 1);
    assert_eq!(
        h.notifier.calls(),
        vec![NotifierCall::Deliver(AlertId::Process(42))]
    );
}

#[tokio::test]
async fn test_tick_forwards_process_events_before_memory_event() {
    let h = Harness::new();
    let t0 = Instant::now();
    let hot = Snapshot::new(10.0).with_process(42, "burner", 95.0);
    let sampler = ScriptedSampler::new(vec![Ok(hot.clone()), Ok(hot)]);
    let stats = TickStats::default();

    // First tick: memory raises immediately, CPU window only opens.
    run_tick(&sampler, &h.state, &h.dispatcher, &stats, t0).await;
    assert_eq!(h.notifier.calls(), vec![NotifierCall::Deliver(AlertId::Memory)]);

    let outcome = run_tick(&sampler, &h.state, &h.dispatcher, &stats, at(t0, 60)).await;
    assert_eq!(outcome, TickOutcome::Applied { events: 1 });
    assert_eq!(
        h.notifier.calls(),
        vec![
            NotifierCall::Deliver(AlertId::Memory),
            NotifierCall::Deliver(AlertId::Process(42)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_spawned_worker_raises_after_sustain_and_shuts_down() {
    let h = Harness::new();
    let sampler = Arc::new(ScriptedSampler::repeating(one_process(42, 95.0)));
    let stats = Arc::new(TickStats::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let handle = spawn(
        worker_deps(&h, sampler.clone(), stats.clone(), shutdown_rx),
        FIVE_SECOND_POLL,
    );

    tokio::time::sleep(tokio::time::Duration::from_secs(57)).await;
    assert!(
        h.notifier.calls().is_empty(),
        "still inside the sustain window"
    );

    tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
    assert_eq!(
        h.notifier.calls(),
        vec![NotifierCall::Deliver(AlertId::Process(42))]
    );
    assert!(stats.ticks() >= 13);
    assert!(sampler.calls.load(Ordering::SeqCst) >= 13);

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn test_sampling_runs_without_the_state_lock() {
    let h = Harness::new();
    let sampler = LockCheckingSampler {
        state: h.state.clone(),
        snapshot: one_process(42, 95.0),
        calls: AtomicUsize::new(0),
    };
    let stats = TickStats::default();
    let t0 = Instant::now();

    run_tick(&sampler, &h.state, &h.dispatcher, &stats, t0).await;
    let outcome = run_tick(&sampler, &h.state, &h.dispatcher, &stats, at(t0, 60)).await;

    assert_eq!(sampler.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome, TickOutcome::Applied { events: 1 });
}

#[tokio::test]
async fn test_user_action_waits_for_a_tick_holding_the_state() {
    let h = Harness::new();
    let sampler = ScriptedSampler::repeating(one_process(42, 95.0));
    let stats = TickStats::default();
    let t0 = Instant::now();
    run_tick(&sampler, &h.state, &h.dispatcher, &stats, t0).await;
    run_tick(&sampler, &h.state, &h.dispatcher, &stats, at(t0, 60)).await;
    assert!(h.dispatcher.is_outstanding(AlertId::Process(42)));

    // Stand in for a tick that is mid-apply.
    let tick_guard = h.state.lock().await;
    let dispatcher = h.dispatcher.clone();
    let action = tokio::spawn(async move {
        dispatcher
            .handle_user_action(AlertId::Process(42), "terminate")
            .await
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    assert!(!action.is_finished());
    assert!(tick_guard.registry.get(42).is_some());
    assert!(h.dispatcher.is_outstanding(AlertId::Process(42)));
    drop(tick_guard);

    let outcome = action.await.unwrap().unwrap();
    assert!(matches!(
        outcome,
        ActionOutcome::Signalled {
            pid: 42,
            kind: SignalKind::Graceful,
            was_tracked: true,
            ..
        }
    ));
    assert!(h.state.lock().await.registry.get(42).is_none());
    assert!(!h.dispatcher.is_outstanding(AlertId::Process(42)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_loop_then_withdraws_outstanding_alerts() {
    let h = Harness::new();
    let sampler = Arc::new(ScriptedSampler::repeating(one_process(42, 95.0)));
    let stats = Arc::new(TickStats::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn(
        worker_deps(&h, sampler.clone(), stats.clone(), shutdown_rx),
        FIVE_SECOND_POLL,
    );

    tokio::time::sleep(tokio::time::Duration::from_secs(65)).await;
    assert!(h.dispatcher.is_outstanding(AlertId::Process(42)));

    shutdown(shutdown_tx, handle, &h.dispatcher).await;
    assert!(h.dispatcher.outstanding().is_empty());
    assert_eq!(
        h.notifier.calls().last(),
        Some(&NotifierCall::Withdraw(AlertId::Process(42)))
    );

    let ticks_at_shutdown = stats.ticks();
    tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    assert_eq!(stats.ticks(), ticks_at_shutdown);
}
