//! Nudge handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::page_limit;
use crate::{AppError, AppState};
use nudge_core::models::{Nudge, NudgeStatus};
use nudge_core::FeedbackResponse;

#[derive(Debug, Deserialize)]
pub struct NudgeQuery {
    /// Filter by status (pending, delivered, accepted, ignored, snoozed)
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// Request body for answering a nudge
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    /// accepted, ignored or snoozed
    pub response: FeedbackResponse,
}

/// GET /api/users/:user_id/nudges - Newest first
pub async fn list_nudges(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<NudgeQuery>,
) -> Result<Json<Vec<Nudge>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<NudgeStatus>())
        .transpose()
        .map_err(|_| AppError::bad_request("Unknown nudge status"))?;

    Ok(Json(state.db.list_nudges(
        &user_id,
        status,
        page_limit(params.limit, 50),
    )?))
}

/// POST /api/nudges/:id/respond - Record the answer and feed the behavior profile
pub async fn respond_nudge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<Nudge>, AppError> {
    let nudge = state.engine.adapter().record_nudge_response(
        &state.db,
        id,
        body.response,
        Utc::now(),
    )?;
    Ok(Json(nudge))
}
