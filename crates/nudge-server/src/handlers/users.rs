//! User handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{AppError, AppState};
use nudge_core::models::{NewUser, User};

/// POST /api/users - Create or update a user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewUser>,
) -> Result<Json<User>, AppError> {
    if body.user_id.trim().is_empty() {
        return Err(AppError::bad_request("user_id is required"));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    if let Some(goal) = body.savings_goal {
        if !(0.0..=1.0).contains(&goal) {
            return Err(AppError::bad_request("savings_goal must be between 0 and 1"));
        }
    }

    let user = state.db.upsert_user(&body)?;
    info!(user_id = %user.user_id, "Upserted user");
    Ok(Json(user))
}

/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    state
        .db
        .get_user(&user_id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User not found"))
}
