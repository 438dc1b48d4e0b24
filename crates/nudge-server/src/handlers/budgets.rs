//! Budget handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::transactions::CreatedResponse;
use crate::{AppError, AppState, SuccessResponse};
use nudge_core::models::{Budget, BudgetPeriod, Category, NewBudget};
use nudge_core::normalize::normalize_category;

/// Request body for setting a budget
///
/// The category may be any alias ("restaurants", "Food & Drink"); it is
/// normalized before storing.
#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    pub category: String,
    pub limit: f64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

/// GET /api/users/:user_id/budgets
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Budget>>, AppError> {
    Ok(Json(state.db.list_budgets(&user_id)?))
}

/// POST /api/users/:user_id/budgets - Create or replace the budget for a category
pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<CreateBudgetRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    if !body.limit.is_finite() || body.limit <= 0.0 {
        return Err(AppError::bad_request("limit must be greater than zero"));
    }

    let category = normalize_category(&body.category);
    if category == Category::Income {
        return Err(AppError::bad_request("income cannot be budgeted"));
    }

    let id = state.db.upsert_budget(
        &user_id,
        &NewBudget {
            category,
            limit: body.limit,
            period: body.period,
        },
    )?;
    info!(user_id = %user_id, category = %category, limit = body.limit, "Set budget");
    Ok(Json(CreatedResponse { id }))
}

/// DELETE /api/budgets/:id
pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.delete_budget(id)? {
        return Err(AppError::not_found("Budget not found"));
    }
    Ok(Json(SuccessResponse { success: true }))
}
