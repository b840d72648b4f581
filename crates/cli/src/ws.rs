// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional WebSocket dashboard sink. One process-wide broadcast receiver
//! per connection, grounded in `coopmux::transport::ws::ws_handler` /
//! `handle_ws`'s split-socket `tokio::select!` bridge loop — adapted from a
//! per-session bridge to a single shared event stream.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use mortality_core::Runtime;
use serde::Deserialize;
use serde_json::json;

/// Shared process-wide state every dashboard connection reads from.
pub struct DashboardState {
    runtime: Arc<Runtime>,
    sink: Arc<mortality_core::telemetry::WsDashboardSink>,
}

impl DashboardState {
    pub fn new(runtime: Arc<Runtime>, sink: Arc<mortality_core::telemetry::WsDashboardSink>) -> Self {
        Self { runtime, sink }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Ping,
    RequestState,
}

/// Build the `/ws` router.
pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(State(state): State<Arc<DashboardState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn initial_state_frame(state: &DashboardState) -> serde_json::Value {
    let timers = state.runtime.peer_timer_snapshot(None);
    let recent_events: Vec<_> = state.runtime.recorder().events().into_iter().rev().take(50).rev().collect();
    json!({
        "type": "initial_state",
        "agents": timers.keys().cloned().collect::<Vec<_>>(),
        "timers": timers,
        "recent_events": recent_events,
        "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

async fn handle_ws(socket: WebSocket, state: Arc<DashboardState>) {
    let mut events = state.sink.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let initial = initial_state_frame(&state).await;
    if ws_tx.send(Message::Text(initial.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let frame = json!({ "type": "event", "seq": event.seq, "event": event.event, "ts": event.ts, "payload": event.payload });
                        if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Ping) => {
                                if ws_tx.send(Message::Text(json!({"type": "pong"}).to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ClientFrame::RequestState) => {
                                let snapshot = initial_state_frame(&state).await;
                                if ws_tx.send(Message::Text(snapshot.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}
