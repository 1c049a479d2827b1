// HTTP handlers: version, status, outstanding alerts, user actions

use axum::{
    Json,
    extract::{Path, Request, State},
    http::{StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::models::AlertId;

/// Package name and version (from Cargo.toml at build time).
const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: returns service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/status: registry and memory state plus tick counters.
pub(super) async fn status_handler(State(app): State<AppState>) -> impl IntoResponse {
    let (tracked, in_breach, memory) = {
        let state = app.state.lock().await;
        let in_breach = state
            .registry
            .iter()
            .filter(|p| p.breach_start.is_some())
            .count();
        (state.registry.len(), in_breach, state.memory.state().clone())
    };
    let outstanding: Vec<String> = app
        .dispatcher
        .outstanding()
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    Json(serde_json::json!({
        "trackedProcesses": tracked,
        "processesInBreach": in_breach,
        "memory": {
            "usagePercent": memory.usage_percent,
            "alertActive": memory.alert_active,
        },
        "outstandingAlerts": outstanding,
        "ticks": app.stats.ticks(),
        "sampleFailures": app.stats.sample_failures(),
        "eventsEmitted": app.stats.events_emitted(),
        "wsAlertClients": app.ws_alert_connections.load(std::sync::atomic::Ordering::Relaxed),
        "thresholds": {
            "cpuPercent": app.thresholds.cpu_percent,
            "memoryPercent": app.thresholds.memory_percent,
            "sustainSecs": app.thresholds.sustain.as_secs(),
        },
    }))
}

/// GET /api/alerts: notifications currently delivered.
pub(super) async fn alerts_handler(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.notifier.delivered())
}

/// POST /api/alerts/{alert_id}/actions/{action}: user picked an action on a notification.
/// Bad ids and unknown actions are acknowledged with 400 and change nothing.
pub(super) async fn action_handler(
    State(app): State<AppState>,
    Path((alert_id, action)): Path<(String, String)>,
) -> Response {
    let alert: AlertId = match alert_id.parse() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "user action for unparsable alert id");
            return bad_request(e.to_string());
        }
    };
    tracing::info!(alert = %alert, action = %action, "notification response received");
    match app.dispatcher.handle_user_action(alert, &action).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

/// Rejects requests whose `Origin` does not name this host. Requests without
/// an `Origin` (local tools, curl) pass through.
pub(super) async fn same_origin_only(request: Request, next: Next) -> Response {
    let headers = request.headers();
    if let Some(origin) = headers.get(header::ORIGIN) {
        let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
        let origin_authority = origin
            .to_str()
            .ok()
            .and_then(|o| o.parse::<Uri>().ok())
            .filter(|uri| uri.scheme().is_some())
            .and_then(|uri| uri.authority().map(|a| a.as_str().to_owned()));
        if origin_authority.is_none() || origin_authority.as_deref() != host {
            tracing::warn!(origin = ?origin, host = ?host, "refusing cross-origin user action");
            return (
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({ "error": "cross-origin user actions are not allowed" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
