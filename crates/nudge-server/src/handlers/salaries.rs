//! Salary handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use super::transactions::CreatedResponse;
use crate::{AppError, AppState};
use nudge_core::models::{NewSalary, Salary};

/// GET /api/users/:user_id/salaries - Salary history, newest first
pub async fn list_salaries(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Salary>>, AppError> {
    Ok(Json(state.db.list_salaries(&user_id)?))
}

/// POST /api/users/:user_id/salaries
pub async fn create_salary(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<NewSalary>,
) -> Result<Json<CreatedResponse>, AppError> {
    if !body.amount.is_finite() || body.amount <= 0.0 {
        return Err(AppError::bad_request("amount must be greater than zero"));
    }
    let id = state.db.insert_salary(&user_id, &body)?;
    Ok(Json(CreatedResponse { id }))
}
