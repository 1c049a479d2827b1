// WebSocket alert stream: welcome with outstanding alerts, then deliver/withdraw messages

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::Notification;
use crate::notifier::NotifierMessage;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements ws_alerts connection count on drop (connect = +1, drop = -1).
struct WsAlertsGuard(Arc<AtomicUsize>);

impl Drop for WsAlertsGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
    }
}

pub(super) async fn ws_alerts(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
) -> impl IntoResponse {
    let notifier = app.notifier.clone();
    let conn_count = app.ws_alert_connections.clone();
    ws.on_upgrade(move |socket| async move {
        // Subscribe before snapshotting so nothing delivered in between is lost.
        let mut rx = notifier.subscribe();
        let delivered = notifier.delivered();
        if let Err(e) = stream_alerts(socket, &mut rx, delivered, conn_count).await {
            tracing::info!("Alert stream error: {}", e);
        }
    })
}

async fn send_text(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    !(r.is_err() || r.unwrap_or(Ok(())).is_err())
}

async fn stream_alerts(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<NotifierMessage>,
    delivered: Vec<Notification>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let _guard = WsAlertsGuard(conn_count);
    tracing::info!("Client connected to alert stream");

    let welcome = serde_json::json!({ "type": "welcome", "alerts": delivered });
    if !send_text(&mut socket, serde_json::to_string(&welcome)?).await {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(message) => {
                        let json = serde_json::to_string(&message)?;
                        if !send_text(&mut socket, json).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/alerts client lagged, skipped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("Client disconnected from alert stream");
    Ok(())
}
