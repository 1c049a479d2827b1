// HTTP + WebSocket routes: the notification surface clients subscribe to and
// post user actions back through.

mod http;
mod ws;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::dispatcher::AlertDispatcher;
use crate::models::Thresholds;
use crate::notifier::BroadcastNotifier;
use crate::state::SharedState;
use crate::worker::TickStats;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) state: SharedState,
    pub(crate) dispatcher: Arc<AlertDispatcher>,
    pub(crate) notifier: Arc<BroadcastNotifier>,
    pub(crate) stats: Arc<TickStats>,
    pub(crate) ws_alert_connections: Arc<AtomicUsize>,
    pub(crate) thresholds: Thresholds,
}

pub fn app(
    state: SharedState,
    dispatcher: Arc<AlertDispatcher>,
    notifier: Arc<BroadcastNotifier>,
    stats: Arc<TickStats>,
    ws_alert_connections: Arc<AtomicUsize>,
    thresholds: Thresholds,
) -> Router {
    let state = AppState {
        state,
        dispatcher,
        notifier,
        stats,
        ws_alert_connections,
        thresholds,
    };
    // Read-only routes may be fetched from any origin.
    let read_only = Router::new()
        .route("/", get(|| async { "sysguard is watching" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/api/alerts", get(http::alerts_handler)) // GET /api/alerts
        .route("/ws/alerts", get(ws::ws_alerts)) // WS /ws/alerts
        .layer(CorsLayer::new().allow_origin(Any));

    // Actions signal processes: no CORS, and browsers from other origins are refused.
    let actions = Router::new()
        .route(
            "/api/alerts/{alert_id}/actions/{action}",
            post(http::action_handler),
        ) // POST user action callback
        .route_layer(middleware::from_fn(http::same_origin_only));

    read_only.merge(actions).with_state(state)
}
