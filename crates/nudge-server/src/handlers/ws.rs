//! WebSocket push channel
//!
//! A client connects to `/api/ws` naming its user with the `x-user-id`
//! header or a `user_id` query parameter. Every notification published for
//! that user is forwarded as a JSON text frame. A text frame of `ping` (or
//! `{"type":"ping"}`) is answered with a `pong` notification.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{AppError, AppState};
use nudge_core::Notification;

const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Option<String>,
}

fn resolve_user(headers: &HeaderMap, query: WsQuery) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.user_id)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
}

fn is_ping(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("ping") {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "ping"))
        .unwrap_or(false)
}

/// GET /api/ws
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let user_id = resolve_user(&headers, query)
        .ok_or_else(|| AppError::bad_request("user id required (x-user-id header or user_id query)"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn send_json(socket: &mut WebSocket, notification: &Notification) -> bool {
    match serde_json::to_string(notification) {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode notification");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let mut rx = state.hub.subscribe(&user_id);
    info!(user_id = %user_id, "Push channel opened");

    loop {
        tokio::select! {
            published = rx.recv() => match published {
                Ok(notification) => {
                    if !send_json(&mut socket, &notification).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "Push channel lagged, dropped notifications");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) if is_ping(&text) => {
                    if !send_json(&mut socket, &Notification::Pong { at: Utc::now() }).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(other)) => debug!(user_id = %user_id, ?other, "Ignoring client frame"),
            },
        }
    }

    drop(rx);
    state.hub.prune(&user_id);
    info!(user_id = %user_id, "Push channel closed");
}
