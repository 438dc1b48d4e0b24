//! Behavior profile handler

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AppError, AppState};
use nudge_core::BehaviorProfile;

#[derive(Debug, Serialize)]
pub struct BehaviorResponse {
    #[serde(flatten)]
    pub profile: BehaviorProfile,
    /// Nudges a single engine run may produce at this sensitivity
    pub max_nudges: usize,
    /// When a nudge created now would be delivered
    pub next_delivery: DateTime<Utc>,
}

/// GET /api/users/:user_id/behavior
pub async fn get_behavior(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BehaviorResponse>, AppError> {
    let adapter = state.engine.adapter();
    let profile = adapter.load_profile(&state.db, &user_id)?;

    Ok(Json(BehaviorResponse {
        max_nudges: adapter.max_nudges(profile.sensitivity),
        next_delivery: adapter.next_delivery_time(&profile, Utc::now()),
        profile,
    }))
}
