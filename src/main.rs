use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use sysguard::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let thresholds = app_config.thresholds();
    tracing::info!(
        cpu_percent = thresholds.cpu_percent,
        memory_percent = thresholds.memory_percent,
        sustain_secs = thresholds.sustain.as_secs(),
        poll_interval_ms = app_config.monitoring.poll_interval_ms,
        "sysguard starting"
    );

    let shared_state = state::MonitorState::shared(thresholds);
    let notifier = Arc::new(notifier::BroadcastNotifier::new(
        app_config.publishing.broadcast_capacity,
    ));
    let dispatcher = Arc::new(dispatcher::AlertDispatcher::new(
        notifier.clone(),
        Arc::new(os::SysinfoSignaller::new()),
        Arc::new(os::CommandLauncher::new(
            app_config.actions.system_monitor_command.clone(),
        )),
        shared_state.clone(),
    ));
    let stats = Arc::new(worker::TickStats::default());
    let ws_alert_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            sampler: Arc::new(sampler::SysinfoSampler::new()),
            state: shared_state.clone(),
            dispatcher: dispatcher.clone(),
            stats: stats.clone(),
            ws_alert_connections: ws_alert_connections.clone(),
            shutdown_rx,
        },
        worker::WorkerConfig {
            poll_interval_ms: app_config.monitoring.poll_interval_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    let app = routes::app(
        shared_state,
        dispatcher.clone(),
        notifier,
        stats,
        ws_alert_connections,
        thresholds,
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let served = tokio::select! {
        result = axum::serve(listener, app) => result,
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            Ok(())
        }
    };

    worker::shutdown(shutdown_tx, worker_handle, &dispatcher).await;
    served?;
    Ok(())
}
