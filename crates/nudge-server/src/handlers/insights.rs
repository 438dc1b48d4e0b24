//! Insight handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::as_of_or_today;
use crate::{AppError, AppState, SuccessResponse};
use nudge_core::{InsightStatus, RunReport, StoredInsight};

/// Longest snooze accepted from clients
const MAX_SNOOZE_DAYS: u32 = 90;

/// Query parameters for listing insights
#[derive(Debug, Deserialize)]
pub struct InsightQuery {
    /// Filter by status (active, dismissed, snoozed)
    pub status: Option<String>,
    /// Return only the top N currently shown insights
    pub top: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub as_of: Option<NaiveDate>,
}

/// Request body for snoozing an insight
#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    /// Number of days to snooze
    pub days: u32,
}

#[derive(Debug, Serialize)]
pub struct SnoozeResponse {
    pub snoozed_until: DateTime<Utc>,
}

/// Request body for feedback on an insight
#[derive(Debug, Deserialize)]
pub struct InsightFeedbackRequest {
    pub feedback: String,
}

/// GET /api/users/:user_id/insights
pub async fn list_insights(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<InsightQuery>,
) -> Result<Json<Vec<StoredInsight>>, AppError> {
    if let Some(limit) = params.top {
        return Ok(Json(state.db.top_insights(&user_id, limit.clamp(1, 50))?));
    }

    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<InsightStatus>())
        .transpose()
        .map_err(|_| AppError::bad_request("Unknown insight status"))?;

    Ok(Json(state.db.list_insights(&user_id, status)?))
}

/// POST /api/users/:user_id/insights/generate - Run the engine and push nudges
pub async fn generate_insights(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<GenerateQuery>,
) -> Result<Json<RunReport>, AppError> {
    let report = state.engine.run_and_persist_at(
        &state.db,
        &user_id,
        as_of_or_today(params.as_of),
        Utc::now(),
        Some(&state.hub),
    )?;
    info!(
        user_id = %user_id,
        generated = report.generated,
        pushed = report.pushed,
        "Generated insights"
    );
    Ok(Json(report))
}

fn require_insight(state: &AppState, id: i64) -> Result<StoredInsight, AppError> {
    state
        .db
        .get_insight(id)?
        .ok_or_else(|| AppError::not_found("Insight not found"))
}

/// GET /api/insights/:id
pub async fn get_insight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<StoredInsight>, AppError> {
    Ok(Json(require_insight(&state, id)?))
}

/// POST /api/insights/:id/dismiss
pub async fn dismiss_insight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_insight(&state, id)?;
    state.db.dismiss_insight(id)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/insights/:id/snooze
pub async fn snooze_insight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<SnoozeRequest>,
) -> Result<Json<SnoozeResponse>, AppError> {
    if body.days == 0 || body.days > MAX_SNOOZE_DAYS {
        return Err(AppError::bad_request("days must be between 1 and 90"));
    }
    require_insight(&state, id)?;
    let snoozed_until = state.db.snooze_insight(id, body.days, Utc::now())?;
    Ok(Json(SnoozeResponse { snoozed_until }))
}

/// POST /api/insights/:id/restore
pub async fn restore_insight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    require_insight(&state, id)?;
    state.db.restore_insight(id)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/insights/:id/feedback
pub async fn insight_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<InsightFeedbackRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let feedback = body.feedback.trim();
    if feedback.is_empty() {
        return Err(AppError::bad_request("feedback is required"));
    }
    require_insight(&state, id)?;
    state.db.set_insight_feedback(id, feedback)?;
    Ok(Json(SuccessResponse { success: true }))
}
