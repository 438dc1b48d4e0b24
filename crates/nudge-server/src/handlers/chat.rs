//! Chat handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::page_limit;
use crate::{AppError, AppState};
use nudge_core::models::ChatMessage;
use nudge_core::ChatReply;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// POST /api/users/:user_id/chat
///
/// Uses the AI backend when one is configured and reachable, templated
/// replies otherwise. Both turns are stored.
pub async fn send_chat(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let reply = state.chat.reply(&user_id, &body.message).await?;
    Ok(Json(reply))
}

/// GET /api/users/:user_id/chat/history - Oldest first
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    Ok(Json(
        state
            .db
            .chat_history(&user_id, page_limit(params.limit, 50))?,
    ))
}
